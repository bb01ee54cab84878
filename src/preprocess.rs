use super::*;

/// Deterministic image-to-tensor transform applied before every forward
/// pass: shorter-edge resize, center crop, scale to [0, 1], then per
/// channel normalization in R, G, B order.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Preprocessor {
  pub(crate) resize: u32,
  pub(crate) crop: u32,
  pub(crate) mean: [f32; 3],
  pub(crate) std: [f32; 3],
}

impl Default for Preprocessor {
  fn default() -> Self {
    Self {
      resize: 256,
      crop: 224,
      mean: [0.485, 0.456, 0.406],
      std: [0.229, 0.224, 0.225],
    }
  }
}

impl Preprocessor {
  /// Returns a `(1, 3, crop, crop)` tensor.
  pub(crate) fn preprocess(
    &self,
    image: &DynamicImage,
  ) -> Result<Array4<f32>, Error> {
    let channels = image.color().channel_count();

    if channels < 3 {
      return Err(Error::invalid_image(format!(
        "expected at least 3 color channels, found {channels}"
      )));
    }

    let (width, height) = image.dimensions();

    if width == 0 || height == 0 {
      return Err(Error::invalid_image(format!(
        "image has no pixels ({width}x{height})"
      )));
    }

    let (resized_width, resized_height) =
      self.resized_dimensions(width, height);

    let rgb = image.to_rgb8();

    let resized = imageops::resize(
      &rgb,
      resized_width,
      resized_height,
      FilterType::Triangle,
    );

    let left = center_offset(resized_width, self.crop);
    let top = center_offset(resized_height, self.crop);

    let cropped =
      imageops::crop_imm(&resized, left, top, self.crop, self.crop).to_image();

    let size = self.crop as usize;

    let mut tensor = Array4::zeros((1, 3, size, size));

    for (x, y, pixel) in cropped.enumerate_pixels() {
      for (channel, &value) in pixel.0.iter().enumerate() {
        tensor[[0, channel, y as usize, x as usize]] = (value as f32 / 255.0
          - self.mean[channel])
          / self.std[channel];
      }
    }

    debug!(
      width,
      height, resized_width, resized_height, left, top, "preprocessed image"
    );

    Ok(tensor)
  }

  /// Scales so the shorter edge equals `resize`, truncating the longer edge.
  fn resized_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
    let scale = |long: u32, short: u32| {
      (self.resize as u64 * long as u64 / short as u64) as u32
    };

    if width <= height {
      (self.resize, scale(height, width))
    } else {
      (scale(width, height), self.resize)
    }
  }
}

fn center_offset(size: u32, crop: u32) -> u32 {
  (size.saturating_sub(crop) as f64 / 2.0).round_ties_even() as u32
}

pub(crate) fn decode_image(bytes: &[u8]) -> Result<DynamicImage, Error> {
  image::load_from_memory(bytes).map_err(|source| Error::InvalidImageFormat {
    message: "failed to decode image".into(),
    source: Some(source),
  })
}
