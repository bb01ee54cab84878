use super::*;

/// Errors raised while loading a model or classifying an image.
///
/// Every variant is fatal to the call that produced it. Nothing in the
/// pipeline retries or falls back to a partial result.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
  #[error("invalid image format: {message}")]
  InvalidImageFormat {
    message: String,
    #[source]
    source: Option<image::ImageError>,
  },

  #[error("checkpoint not found at `{}`", path.display())]
  CheckpointMissing { path: PathBuf },

  #[error("checkpoint at `{}` could not be read", path.display())]
  CheckpointMalformed {
    path: PathBuf,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("checkpoint does not match the network architecture: {0}")]
  CheckpointShapeMismatch(Mismatch),

  #[error(
    "model produces {outputs} scores but the vocabulary has {classes} classes"
  )]
  VocabularyMismatch { classes: usize, outputs: usize },

  #[error("no model is loaded")]
  ModelNotLoaded,

  #[error("expected an input tensor of shape {expected}, found {found}")]
  InputShape { expected: Shape, found: Shape },

  #[error("model produced no scores for the input batch")]
  EmptyOutput,

  #[error("model produced a non-finite score for class index {index}")]
  NonFiniteScore { index: usize },

  #[error("tensor shape error")]
  Tensor(#[from] ndarray::ShapeError),
}

impl Error {
  pub(crate) fn invalid_image(message: impl Into<String>) -> Self {
    Self::InvalidImageFormat {
      message: message.into(),
      source: None,
    }
  }
}

/// How a checkpoint disagrees with the architecture it is loaded into.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub(crate) enum Mismatch {
  #[error("tensor `{name}` has shape {found}, expected {expected}")]
  Shape {
    name: String,
    expected: Shape,
    found: Shape,
  },

  #[error("tensor `{name}` is missing")]
  Missing { name: String },

  #[error("unexpected tensor `{name}`")]
  Unexpected { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Shape(pub(crate) Vec<usize>);

impl Display for Shape {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "[")?;

    for (i, dim) in self.0.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{dim}")?;
    }

    write!(f, "]")
  }
}
