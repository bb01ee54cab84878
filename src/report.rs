use super::*;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct RankedClass {
  #[serde(flatten)]
  pub(crate) class: Class,
  pub(crate) percentage: f64,
}

/// Outcome of classifying one image, resolved against the vocabulary.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct Classification {
  pub(crate) class: Class,
  pub(crate) confidence: f64,
  pub(crate) ranking: Vec<RankedClass>,
}

impl Classification {
  pub(crate) fn new(
    vocabulary: &Vocabulary,
    prediction: &Prediction,
    ranking: &[Ranked],
  ) -> Self {
    let class = |index: usize| {
      vocabulary.get(index).cloned().unwrap_or_else(|| Class {
        id: index.to_string(),
        label: index.to_string(),
      })
    };

    Self {
      class: class(prediction.class),
      confidence: prediction.confidence,
      ranking: ranking
        .iter()
        .map(|ranked| RankedClass {
          class: class(ranked.index),
          percentage: ranked.percentage,
        })
        .collect(),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Level {
  High,
  Medium,
  Low,
}

impl Level {
  pub(crate) fn of(percentage: f64) -> Self {
    if percentage >= 80.0 {
      Self::High
    } else if percentage >= 50.0 {
      Self::Medium
    } else {
      Self::Low
    }
  }
}

/// One block per five percent.
fn bar(percentage: f64) -> String {
  "█".repeat((percentage / 5.0).max(0.0) as usize)
}

impl Display for Classification {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    writeln!(f, "Predicted: {} ({})", self.class.label, self.class.id)?;
    writeln!(f, "Confidence: {:.2}%", self.confidence)?;

    let width = self
      .ranking
      .iter()
      .map(|ranked| ranked.class.label.chars().count())
      .max()
      .unwrap_or(0);

    for ranked in &self.ranking {
      writeln!(
        f,
        "  {:width$} ({:15}): {:6.2}% {}",
        ranked.class.label,
        ranked.class.id,
        ranked.percentage,
        bar(ranked.percentage),
      )?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn classification() -> Classification {
    let prediction = Prediction {
      class: 5,
      confidence: 91.0,
      probabilities: vec![0.01, 0.02, 0.03, 0.01, 0.02, 0.91],
    };

    Classification::new(&Vocabulary::default(), &prediction, &rank(&prediction))
  }

  #[test]
  fn resolves_classes() {
    let classification = classification();

    assert_eq!(classification.class.id, "scratches");
    assert_eq!(classification.ranking[0].class.label, "Scratches");
    assert_eq!(classification.ranking[1].class.id, "patches");
    assert_eq!(
      classification.ranking.last().unwrap().class.id,
      "pitted_surface"
    );
  }

  #[test]
  fn levels() {
    assert_eq!(Level::of(100.0), Level::High);
    assert_eq!(Level::of(80.0), Level::High);
    assert_eq!(Level::of(79.99), Level::Medium);
    assert_eq!(Level::of(50.0), Level::Medium);
    assert_eq!(Level::of(49.99), Level::Low);
    assert_eq!(Level::of(0.0), Level::Low);
  }

  #[test]
  fn bar_length() {
    assert_eq!(bar(0.0), "");
    assert_eq!(bar(4.99), "");
    assert_eq!(bar(91.0).chars().count(), 18);
    assert_eq!(bar(100.0).chars().count(), 20);
  }

  #[test]
  fn text_report() {
    let report = classification().to_string();

    let lines = report.lines().collect::<Vec<_>>();

    assert_eq!(lines[0], "Predicted: Scratches (scratches)");
    assert_eq!(lines[1], "Confidence: 91.00%");
    assert_eq!(lines.len(), 8);
    assert!(lines[2].contains("91.00%"));
    assert!(lines[2].ends_with(&bar(91.0)));
  }

  #[test]
  fn json_report() {
    let value = serde_json::to_value(classification()).unwrap();

    assert_eq!(value["class"]["id"], "scratches");
    assert_eq!(value["ranking"][0]["id"], "scratches");
    assert_eq!(value["ranking"][0]["label"], "Scratches");
    assert_eq!(value["ranking"].as_array().unwrap().len(), 6);
  }
}
