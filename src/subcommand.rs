use {
  super::*, app::App, evaluate::Evaluate, init::Init, predict::Predict,
};

mod app;
mod evaluate;
mod init;
mod predict;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
  #[clap(name = "app", about = "Run the interactive demo window")]
  App(App),
  #[clap(name = "evaluate", about = "Measure accuracy on a labeled dataset")]
  Evaluate(Evaluate),
  #[clap(name = "init", about = "Write a freshly initialized checkpoint")]
  Init(Init),
  #[clap(name = "predict", about = "Classify one or more images")]
  Predict(Predict),
}

impl Subcommand {
  pub(crate) fn run(self) -> Result {
    match self {
      Self::App(app) => app.run(),
      Self::Evaluate(evaluate) => evaluate.run(),
      Self::Init(init) => init.run(),
      Self::Predict(predict) => predict.run(),
    }
  }
}

#[derive(Debug, Parser)]
pub(crate) struct ModelOptions {
  #[clap(
    short,
    long,
    env = "DEFECT_WEIGHTS",
    default_value = "best_model.json",
    help = "Checkpoint to load"
  )]
  weights: PathBuf,
  #[clap(long, help = "JSON file listing the classes in head output order")]
  classes: Option<PathBuf>,
}

impl ModelOptions {
  pub(crate) fn vocabulary(&self) -> Result<Vocabulary> {
    match &self.classes {
      Some(path) => Vocabulary::load(path),
      None => Ok(Vocabulary::default()),
    }
  }

  pub(crate) fn pipeline(&self) -> Result<Pipeline> {
    let vocabulary = self.vocabulary()?;

    Pipeline::load(vocabulary, &self.weights).with_context(|| {
      format!("failed to load model from `{}`", self.weights.display())
    })
  }
}

pub(crate) fn read_image(path: &Path, convert: bool) -> Result<DynamicImage> {
  let bytes = fs::read(path)
    .with_context(|| format!("failed to read image `{}`", path.display()))?;

  let image = decode_image(&bytes)?;

  Ok(if convert {
    DynamicImage::ImageRgb8(image.to_rgb8())
  } else {
    image
  })
}
