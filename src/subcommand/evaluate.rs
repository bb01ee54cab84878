use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Evaluate {
  #[clap(flatten)]
  model: ModelOptions,
  #[clap(short, long, default_value = "data/validation/images")]
  data: PathBuf,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Tally {
  correct: usize,
  total: usize,
}

impl Tally {
  fn accuracy(self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.correct as f64 / self.total as f64
    }
  }
}

impl Evaluate {
  pub(crate) fn run(self) -> Result {
    let pipeline = self.model.pipeline()?;

    let dataset = Dataset::load(&self.data, pipeline.vocabulary())
      .context("failed to load dataset")?;

    println!("Dataset loaded successfully:");
    println!("  Images: {}", dataset.len());

    let progress_bar = ProgressBar::new(dataset.len() as u64);

    progress_bar.set_style(
      ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} Images")?
        .progress_chars("=>-"),
    );

    let outcomes = dataset
      .samples
      .par_iter()
      .map(|sample| {
        let outcome = read_image(&sample.path, true)
          .and_then(|image| Ok(pipeline.classify(&image)?));

        progress_bar.inc(1);

        match outcome {
          Ok(classification) => Some(
            pipeline.vocabulary().position(&classification.class.id)
              == Some(sample.label),
          ),
          Err(error) => {
            warn!(path = %sample.path.display(), "skipping image: {error:#}");
            None
          }
        }
      })
      .collect::<Vec<Option<bool>>>();

    progress_bar.finish_with_message("Evaluation complete");

    let tallies = tally(pipeline.vocabulary().len(), &dataset, &outcomes);

    let overall = tallies.iter().fold(Tally::default(), |sum, tally| Tally {
      correct: sum.correct + tally.correct,
      total: sum.total + tally.total,
    });

    let skipped = outcomes.iter().filter(|outcome| outcome.is_none()).count();

    if skipped > 0 {
      println!("Skipped {skipped} unreadable images");
    }

    println!("Accuracy: {:.2}%", overall.accuracy() * 100.0);

    for (class, tally) in pipeline.vocabulary().iter().zip(&tallies) {
      println!(
        "  {:15} {:6.2}% ({}/{})",
        class.id,
        tally.accuracy() * 100.0,
        tally.correct,
        tally.total
      );
    }

    Ok(())
  }
}

/// Per-class counts over the images that were classified.
fn tally(
  classes: usize,
  dataset: &Dataset,
  outcomes: &[Option<bool>],
) -> Vec<Tally> {
  let mut tallies = vec![Tally::default(); classes];

  for (sample, outcome) in dataset.samples.iter().zip(outcomes) {
    if let Some(correct) = outcome {
      tallies[sample.label].total += 1;
      if *correct {
        tallies[sample.label].correct += 1;
      }
    }
  }

  tallies
}
