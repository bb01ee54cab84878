use super::*;

#[derive(Debug, Parser)]
#[clap(version, about = "Surface defect classifier")]
pub(crate) struct Arguments {
  #[clap(subcommand)]
  subcommand: Subcommand,
}

impl Arguments {
  pub(crate) fn run(self) -> Result {
    self.subcommand.run()
  }
}
