use super::*;

const GREEN: Color32 = Color32::from_rgb(0x4c, 0xaf, 0x50);
const ORANGE: Color32 = Color32::from_rgb(0xff, 0x98, 0x00);
const RED: Color32 = Color32::from_rgb(0xf4, 0x43, 0x36);

fn level_color(percentage: f64) -> Color32 {
  match Level::of(percentage) {
    Level::High => GREEN,
    Level::Medium => ORANGE,
    Level::Low => RED,
  }
}

/// Decodes an uploaded file and classifies it. Uploads are converted to RGB
/// before classification, so grayscale scans are accepted here.
fn analyze(
  pipeline: &Pipeline,
  bytes: &[u8],
) -> Result<(DynamicImage, Classification), Error> {
  let image = DynamicImage::ImageRgb8(decode_image(bytes)?.to_rgb8());

  let classification = pipeline.classify(&image)?;

  Ok((image, classification))
}

type Outcome = Result<(DynamicImage, Classification), String>;

pub(crate) struct Demo {
  pipeline: Arc<Pipeline>,
  startup_error: Option<String>,
  preview: Option<TextureHandle>,
  pending: Option<Receiver<Outcome>>,
  result: Option<Result<Classification, String>>,
}

impl eframe::App for Demo {
  fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
    let dropped = ctx.input(|input| input.raw.dropped_files.clone());

    if let Some(file) = dropped.into_iter().next() {
      self.open(ctx, file);
    }

    self.poll(ctx);

    egui::CentralPanel::default().show(ctx, |ui| {
      self.ui(ui);
    });
  }
}

impl Demo {
  pub(crate) fn new(pipeline: Pipeline, startup_error: Option<String>) -> Self {
    Self {
      pipeline: Arc::new(pipeline),
      startup_error,
      preview: None,
      pending: None,
      result: None,
    }
  }

  /// Classifies the dropped file on the rayon pool. A newer drop replaces
  /// the pending one.
  fn open(&mut self, ctx: &egui::Context, file: egui::DroppedFile) {
    let (sender, receiver) = mpsc::channel();

    let pipeline = self.pipeline.clone();
    let ctx = ctx.clone();

    rayon::spawn(move || {
      let bytes = match (&file.bytes, &file.path) {
        (Some(bytes), _) => Ok(bytes.to_vec()),
        (None, Some(path)) => {
          fs::read(path).map_err(|error| error.to_string())
        }
        (None, None) => Err("dropped file has no contents".to_string()),
      };

      let outcome = bytes.and_then(|bytes| {
        analyze(&pipeline, &bytes).map_err(|error| error.to_string())
      });

      // The receiver is gone if another file was dropped meanwhile.
      let _ = sender.send(outcome);

      ctx.request_repaint();
    });

    self.pending = Some(receiver);
  }

  fn poll(&mut self, ctx: &egui::Context) {
    let Some(receiver) = &self.pending else {
      return;
    };

    let outcome = match receiver.try_recv() {
      Ok(outcome) => outcome,
      Err(TryRecvError::Empty) => return,
      Err(TryRecvError::Disconnected) => {
        Err("classification stopped unexpectedly".to_string())
      }
    };

    self.pending = None;

    self.finish(ctx, outcome);
  }

  fn finish(&mut self, ctx: &egui::Context, outcome: Outcome) {
    match outcome {
      Ok((image, classification)) => {
        let thumbnail = image.thumbnail(512, 512).to_rgba8();

        self.preview = Some(ctx.load_texture(
          "preview",
          ColorImage::from_rgba_unmultiplied(
            [thumbnail.width() as usize, thumbnail.height() as usize],
            thumbnail.as_raw(),
          ),
          TextureOptions::LINEAR,
        ));

        info!(
          class = %classification.class.id,
          confidence = classification.confidence,
          "classified dropped image"
        );

        self.result = Some(Ok(classification));
      }
      Err(message) => {
        warn!("failed to classify dropped image: {message}");
        self.preview = None;
        self.result = Some(Err(message));
      }
    }
  }

  fn ui(&mut self, ui: &mut egui::Ui) {
    ui.heading("Surface defect classifier");

    if let Some(error) = &self.startup_error {
      ui.colored_label(RED, format!("Model failed to load: {error}"));
    } else if self.pipeline.is_loaded() {
      ui.label(format!(
        "ResNet18 model ready, {} classes",
        self.pipeline.vocabulary().len()
      ));
    }

    ui.separator();

    ui.columns(2, |columns| {
      columns[0].label("Drop an image (JPG, PNG or BMP) onto this window");

      if let Some(preview) = &self.preview {
        columns[0].add(
          egui::Image::new(egui::load::SizedTexture::from_handle(preview))
            .max_width(340.0),
        );
      }

      let ui = &mut columns[1];

      if self.pending.is_some() {
        ui.spinner();
        ui.label("Classifying…");
        return;
      }

      match &self.result {
        None => {
          ui.label("No image yet");
        }
        Some(Err(message)) => {
          ui.colored_label(RED, message.as_str());
        }
        Some(Ok(classification)) => {
          ui.label(
            egui::RichText::new(classification.class.label.as_str())
              .size(24.0)
              .strong(),
          );
          ui.label(classification.class.id.as_str());
          ui.label(
            egui::RichText::new(format!(
              "Confidence: {:.2}%",
              classification.confidence
            ))
            .size(18.0),
          );

          ui.separator();

          for ranked in &classification.ranking {
            ui.add(
              egui::ProgressBar::new((ranked.percentage / 100.0) as f32)
                .fill(level_color(ranked.percentage))
                .text(format!(
                  "{} {:.2}%",
                  ranked.class.label, ranked.percentage
                )),
            );
          }
        }
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use {
    super::*,
    image::{GrayImage, ImageFormat, Luma},
    std::io::Cursor,
  };

  struct Constant;

  impl Classifier for Constant {
    fn classes(&self) -> usize {
      6
    }

    fn forward(&self, _: ArrayView4<f32>) -> Result<Array2<f32>, Error> {
      Ok(Array2::from_shape_vec((1, 6), vec![0.0, 0.0, 0.0, 5.0, 0.0, 0.0])?)
    }
  }

  fn png(image: DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
      .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
      .unwrap();
    bytes
  }

  #[test]
  fn colors_follow_levels() {
    assert_eq!(level_color(95.0), GREEN);
    assert_eq!(level_color(60.0), ORANGE);
    assert_eq!(level_color(10.0), RED);
  }

  #[test]
  fn analyze_converts_grayscale_uploads() {
    let pipeline = Pipeline::new(
      Vocabulary::default(),
      Preprocessor::default(),
      Arc::new(Constant),
    )
    .unwrap();

    let bytes = png(DynamicImage::ImageLuma8(GrayImage::from_pixel(
      50,
      40,
      Luma([200]),
    )));

    let (image, classification) = analyze(&pipeline, &bytes).unwrap();

    assert_eq!(image.color().channel_count(), 3);
    assert_eq!(classification.class.id, "pitted_surface");
  }

  #[test]
  fn dropped_file_is_classified_in_background() {
    let pipeline = Pipeline::new(
      Vocabulary::default(),
      Preprocessor::default(),
      Arc::new(Constant),
    )
    .unwrap();

    let mut demo = Demo::new(pipeline, None);

    let ctx = egui::Context::default();

    let bytes = png(DynamicImage::ImageLuma8(GrayImage::new(30, 30)));

    let file = egui::DroppedFile {
      bytes: Some(bytes.into()),
      ..Default::default()
    };

    demo.open(&ctx, file);

    assert!(demo.pending.is_some());

    for _ in 0..1000 {
      demo.poll(&ctx);

      if demo.pending.is_none() {
        break;
      }

      std::thread::sleep(std::time::Duration::from_millis(10));
    }

    assert!(demo.pending.is_none());

    assert_eq!(demo.result.unwrap().unwrap().class.id, "pitted_surface");
  }

  #[test]
  fn analyze_without_model() {
    let bytes = png(DynamicImage::ImageLuma8(GrayImage::new(8, 8)));

    assert!(matches!(
      analyze(&Pipeline::unloaded(Vocabulary::default()), &bytes),
      Err(Error::ModelNotLoaded)
    ));
  }

  #[test]
  fn analyze_rejects_garbage() {
    assert!(matches!(
      analyze(&Pipeline::unloaded(Vocabulary::default()), b"GIF89a?"),
      Err(Error::InvalidImageFormat { .. })
    ));
  }
}
