use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Predict {
  #[clap(flatten)]
  model: ModelOptions,
  #[clap(long, help = "Convert grayscale and other images to RGB first")]
  convert: bool,
  #[clap(long, help = "Print results as JSON")]
  json: bool,
  #[clap(required = true)]
  images: Vec<PathBuf>,
}

impl Predict {
  pub(crate) fn run(self) -> Result {
    let pipeline = self.model.pipeline()?;

    self.report(&pipeline)
  }

  /// Prints a result for every image, then fails if any image did.
  fn report(&self, pipeline: &Pipeline) -> Result {
    let results = classify_all(pipeline, &self.images, self.convert);

    let mut failures = 0;

    for (path, result) in self.images.iter().zip(results) {
      match result {
        Ok(classification) => {
          if self.json {
            println!(
              "{}",
              serde_json::json!({
                "image": path.display().to_string(),
                "classification": classification,
              })
            );
          } else {
            println!("{}", path.display());
            print!("{classification}");
          }
        }
        Err(error) => {
          failures += 1;
          eprintln!("error: {}: {error:#}", path.display());
        }
      }
    }

    if failures > 0 {
      bail!("{failures} of {} images failed", self.images.len());
    }

    Ok(())
  }
}

/// One result per path, in order. A failing image does not stop the rest.
fn classify_all(
  pipeline: &Pipeline,
  images: &[PathBuf],
  convert: bool,
) -> Vec<Result<Classification>> {
  images
    .par_iter()
    .map(|path| -> Result<Classification> {
      let image = read_image(path, convert)?;
      Ok(pipeline.classify(&image)?)
    })
    .collect()
}
