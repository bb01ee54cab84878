use super::*;

#[derive(Debug, Parser)]
pub(crate) struct Init {
  #[clap(short, long, default_value = "best_model.json")]
  output: PathBuf,
  #[clap(long, default_value = "42")]
  seed: u64,
  #[clap(long, help = "JSON file listing the classes in head output order")]
  classes: Option<PathBuf>,
  #[clap(long, help = "Overwrite an existing checkpoint")]
  force: bool,
}

impl Init {
  pub(crate) fn run(self) -> Result {
    self.check_output()?;

    let classes = match &self.classes {
      Some(path) => Vocabulary::load(path)?.len(),
      None => Vocabulary::default().len(),
    };

    let config = NetworkConfig::with_classes(classes);

    let checkpoint = Checkpoint::initialize(&config, self.seed);

    checkpoint
      .save(&self.output)
      .context("failed to save checkpoint")?;

    info!(
      tensors = checkpoint.len(),
      seed = self.seed,
      "initialized checkpoint"
    );

    println!(
      "Saved {} tensors ({classes} classes) to {}",
      checkpoint.len(),
      self.output.display()
    );

    Ok(())
  }

  fn check_output(&self) -> Result {
    if self.output.exists() && !self.force {
      bail!(
        "`{}` already exists, pass --force to overwrite it",
        self.output.display()
      );
    }

    Ok(())
  }
}
