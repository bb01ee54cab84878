use super::*;

/// Anything that maps a `(N, 3, H, W)` batch to `(N, classes)` scores.
///
/// `forward` takes `&self` and must not mutate the model, so one instance
/// can serve any number of callers at once.
pub(crate) trait Classifier: Send + Sync {
  fn classes(&self) -> usize;

  fn forward(&self, input: ArrayView4<f32>) -> Result<Array2<f32>, Error>;
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Prediction {
  pub(crate) class: usize,
  pub(crate) confidence: f64,
  pub(crate) probabilities: Vec<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Ranked {
  pub(crate) index: usize,
  pub(crate) percentage: f64,
}

/// Softmax over `scores`, then arg-max. Exact ties go to the lowest index.
pub(crate) fn decide(scores: ArrayView1<f32>) -> Result<Prediction, Error> {
  if let Some(index) = scores.iter().position(|score| !score.is_finite()) {
    return Err(Error::NonFiniteScore { index });
  }

  let probabilities = softmax(scores.mapv(f64::from).view());

  let class = argmax(&probabilities.view());

  Ok(Prediction {
    class,
    confidence: probabilities[class] * 100.0,
    probabilities: probabilities.to_vec(),
  })
}

/// Every class with its percentage, most likely first.
pub(crate) fn rank(prediction: &Prediction) -> Vec<Ranked> {
  let mut ranking = prediction
    .probabilities
    .iter()
    .enumerate()
    .map(|(index, probability)| Ranked {
      index,
      percentage: probability * 100.0,
    })
    .collect::<Vec<_>>();

  sort_ranking(&mut ranking);

  ranking
}

/// Stable descending sort, so exact ties keep their existing order.
pub(crate) fn sort_ranking(ranking: &mut [Ranked]) {
  ranking.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
}

pub(crate) struct Pipeline {
  vocabulary: Vocabulary,
  preprocessor: Preprocessor,
  model: Option<Arc<dyn Classifier>>,
}

impl Pipeline {
  pub(crate) fn new(
    vocabulary: Vocabulary,
    preprocessor: Preprocessor,
    model: Arc<dyn Classifier>,
  ) -> Result<Self, Error> {
    if model.classes() != vocabulary.len() {
      return Err(Error::VocabularyMismatch {
        classes: vocabulary.len(),
        outputs: model.classes(),
      });
    }

    Ok(Self {
      vocabulary,
      preprocessor,
      model: Some(model),
    })
  }

  /// A pipeline with no model. Every classification fails with
  /// `ModelNotLoaded`.
  pub(crate) fn unloaded(vocabulary: Vocabulary) -> Self {
    Self {
      vocabulary,
      preprocessor: Preprocessor::default(),
      model: None,
    }
  }

  /// Loads the default ResNet18 architecture with one output per
  /// vocabulary class.
  pub(crate) fn load(
    vocabulary: Vocabulary,
    weights: &Path,
  ) -> Result<Self, Error> {
    let config = NetworkConfig::with_classes(vocabulary.len());

    let network = Network::load_weights(weights, &config)?;

    Self::new(vocabulary, Preprocessor::default(), Arc::new(network))
  }

  pub(crate) fn vocabulary(&self) -> &Vocabulary {
    &self.vocabulary
  }

  pub(crate) fn is_loaded(&self) -> bool {
    self.model.is_some()
  }

  fn model(&self) -> Result<&dyn Classifier, Error> {
    self.model.as_deref().ok_or(Error::ModelNotLoaded)
  }

  pub(crate) fn preprocess(
    &self,
    image: &DynamicImage,
  ) -> Result<Array4<f32>, Error> {
    self.preprocessor.preprocess(image)
  }

  /// Scores for the single image in `tensor`, which must have the
  /// `(1, 3, crop, crop)` shape `preprocess` produces.
  pub(crate) fn infer(
    &self,
    tensor: ArrayView4<f32>,
  ) -> Result<Array1<f32>, Error> {
    let model = self.model()?;

    let crop = self.preprocessor.crop as usize;

    if tensor.dim() != (1, 3, crop, crop) {
      return Err(Error::InputShape {
        expected: Shape(vec![1, 3, crop, crop]),
        found: Shape(tensor.shape().to_vec()),
      });
    }

    let scores = model.forward(tensor)?;

    if scores.nrows() == 0 {
      return Err(Error::EmptyOutput);
    }

    if scores.ncols() != self.vocabulary.len() {
      return Err(Error::VocabularyMismatch {
        classes: self.vocabulary.len(),
        outputs: scores.ncols(),
      });
    }

    Ok(scores.row(0).to_owned())
  }

  pub(crate) fn classify(
    &self,
    image: &DynamicImage,
  ) -> Result<Classification, Error> {
    self.model()?;

    let tensor = self.preprocess(image)?;

    let scores = self.infer(tensor.view())?;

    let prediction = decide(scores.view())?;

    let ranking = rank(&prediction);

    debug!(
      class = prediction.class,
      confidence = prediction.confidence,
      "classified image"
    );

    Ok(Classification::new(&self.vocabulary, &prediction, &ranking))
  }
}
