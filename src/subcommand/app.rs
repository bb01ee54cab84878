use super::*;

#[derive(Debug, Parser)]
pub(crate) struct App {
  #[clap(flatten)]
  model: ModelOptions,
}

impl App {
  pub(crate) fn run(self) -> Result {
    let demo = match self.model.pipeline() {
      Ok(pipeline) => Demo::new(pipeline, None),
      Err(error) => {
        let message = format!("{error:#}");
        warn!("starting without a model: {message}");
        Demo::new(Pipeline::unloaded(self.model.vocabulary()?), Some(message))
      }
    };

    let native_options = NativeOptions {
      centered: true,
      viewport: egui::ViewportBuilder::default()
        .with_inner_size([760.0, 520.0])
        .with_drag_and_drop(true),
      ..Default::default()
    };

    eframe::run_native(
      env!("CARGO_PKG_NAME"),
      native_options,
      Box::new(|_| Ok(Box::new(demo))),
    )
    .map_err(|error| anyhow::anyhow!("failed to run demo window: {error}"))?;

    Ok(())
  }
}
