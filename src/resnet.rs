use super::*;

/// Bias-free 2D convolution, evaluated as im2col followed by a matrix
/// product.
#[derive(Clone, Debug)]
pub(crate) struct Conv2d {
  weight: Array2<f32>,
  in_channels: usize,
  out_channels: usize,
  kernel: usize,
  stride: usize,
  padding: usize,
}

impl Conv2d {
  pub(crate) fn new(
    weight: Array4<f32>,
    stride: usize,
    padding: usize,
  ) -> Result<Self, Error> {
    let (out_channels, in_channels, kernel, _) = weight.dim();

    let weight = weight
      .as_standard_layout()
      .into_owned()
      .into_shape_with_order((out_channels, in_channels * kernel * kernel))?;

    Ok(Self {
      weight,
      in_channels,
      out_channels,
      kernel,
      stride,
      padding,
    })
  }

  fn load(
    reader: &mut ParameterReader,
    prefix: &str,
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
  ) -> Result<Self, Error> {
    let weight = reader.take::<Ix4>(
      &format!("{prefix}.weight"),
      &[out_channels, in_channels, kernel, kernel],
    )?;

    Self::new(weight, stride, padding)
  }

  fn output_size(&self, size: usize) -> usize {
    (size + 2 * self.padding).saturating_sub(self.kernel) / self.stride + 1
  }

  pub(crate) fn forward(
    &self,
    input: ArrayView4<f32>,
  ) -> Result<Array4<f32>, Error> {
    let (batch, channels, height, width) = input.dim();

    if channels != self.in_channels {
      return Err(Error::InputShape {
        expected: Shape(vec![batch, self.in_channels, height, width]),
        found: Shape(input.shape().to_vec()),
      });
    }

    let (out_height, out_width) =
      (self.output_size(height), self.output_size(width));

    let mut output =
      Array4::zeros((batch, self.out_channels, out_height, out_width));

    for (image, mut out) in input.outer_iter().zip(output.outer_iter_mut()) {
      let columns = self.im2col(image, out_height, out_width)?;

      let product = self.weight.dot(&columns);

      for (mut plane, row) in out.outer_iter_mut().zip(product.rows()) {
        plane
          .iter_mut()
          .zip(row.iter())
          .for_each(|(o, &value)| *o = value);
      }
    }

    Ok(output)
  }

  /// Unfolds `image` into a `(channels * kernel^2, out_height * out_width)`
  /// matrix. Positions falling in the zero padding stay zero.
  fn im2col(
    &self,
    image: ArrayView3<f32>,
    out_height: usize,
    out_width: usize,
  ) -> Result<Array2<f32>, Error> {
    let (_, height, width) = image.dim();

    let kernel = self.kernel;

    let rows = self.in_channels * kernel * kernel;
    let columns = out_height * out_width;

    let mut buffer = vec![0.0; rows * columns];

    buffer
      .par_chunks_mut(columns)
      .enumerate()
      .for_each(|(row, chunk)| {
        let channel = row / (kernel * kernel);
        let ky = (row / kernel) % kernel;
        let kx = row % kernel;

        for oy in 0..out_height {
          let Some(y) = (oy * self.stride + ky).checked_sub(self.padding) else {
            continue;
          };

          if y >= height {
            continue;
          }

          for ox in 0..out_width {
            let Some(x) = (ox * self.stride + kx).checked_sub(self.padding)
            else {
              continue;
            };

            if x < width {
              chunk[oy * out_width + ox] = image[[channel, y, x]];
            }
          }
        }
      });

    Ok(Array2::from_shape_vec((rows, columns), buffer)?)
  }
}

/// Batch normalization in evaluation mode, folded into a per-channel affine
/// transform.
#[derive(Clone, Debug)]
pub(crate) struct BatchNorm2d {
  scale: Array1<f32>,
  shift: Array1<f32>,
}

impl BatchNorm2d {
  const EPSILON: f32 = 1e-5;

  pub(crate) fn new(
    weight: Array1<f32>,
    bias: Array1<f32>,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,
  ) -> Self {
    let scale = weight / running_var.mapv(|var| (var + Self::EPSILON).sqrt());
    let shift = bias - &running_mean * &scale;

    Self { scale, shift }
  }

  fn load(
    reader: &mut ParameterReader,
    prefix: &str,
    channels: usize,
  ) -> Result<Self, Error> {
    let mut take = |suffix: &str| {
      reader.take::<Ix1>(&format!("{prefix}.{suffix}"), &[channels])
    };

    let weight = take("weight")?;
    let bias = take("bias")?;
    let running_mean = take("running_mean")?;
    let running_var = take("running_var")?;

    Ok(Self::new(weight, bias, running_mean, running_var))
  }

  pub(crate) fn apply(&self, x: &mut Array4<f32>) {
    for ((mut channel, &scale), &shift) in x
      .axis_iter_mut(Axis(1))
      .zip(self.scale.iter())
      .zip(self.shift.iter())
    {
      channel.mapv_inplace(|value| value * scale + shift);
    }
  }
}

/// 3x3 max pooling with stride 2 and padding 1. Padding never wins.
pub(crate) fn max_pool(input: ArrayView4<f32>) -> Array4<f32> {
  let (batch, channels, height, width) = input.dim();

  let (out_height, out_width) = ((height + 1) / 2, (width + 1) / 2);

  Array4::from_shape_fn(
    (batch, channels, out_height, out_width),
    |(n, c, oy, ox)| {
      let mut max = f32::NEG_INFINITY;

      for y in (2 * oy).saturating_sub(1)..(2 * oy + 2).min(height) {
        for x in (2 * ox).saturating_sub(1)..(2 * ox + 2).min(width) {
          max = max.max(input[[n, c, y, x]]);
        }
      }

      max
    },
  )
}

/// Averages every channel down to a single value: `(N, C, H, W) -> (N, C)`.
pub(crate) fn global_average_pool(input: ArrayView4<f32>) -> Array2<f32> {
  let (_, _, height, width) = input.dim();

  input.sum_axis(Axis(3)).sum_axis(Axis(2)) / (height * width).max(1) as f32
}

#[derive(Clone, Debug)]
struct Downsample {
  conv: Conv2d,
  bn: BatchNorm2d,
}

#[derive(Clone, Debug)]
struct BasicBlock {
  conv1: Conv2d,
  bn1: BatchNorm2d,
  conv2: Conv2d,
  bn2: BatchNorm2d,
  downsample: Option<Downsample>,
}

impl BasicBlock {
  fn load(
    reader: &mut ParameterReader,
    prefix: &str,
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    downsample: bool,
  ) -> Result<Self, Error> {
    let conv1 = Conv2d::load(
      reader,
      &format!("{prefix}.conv1"),
      in_channels,
      out_channels,
      3,
      stride,
      1,
    )?;

    let bn1 =
      BatchNorm2d::load(reader, &format!("{prefix}.bn1"), out_channels)?;

    let conv2 = Conv2d::load(
      reader,
      &format!("{prefix}.conv2"),
      out_channels,
      out_channels,
      3,
      1,
      1,
    )?;

    let bn2 =
      BatchNorm2d::load(reader, &format!("{prefix}.bn2"), out_channels)?;

    let downsample = if downsample {
      Some(Downsample {
        conv: Conv2d::load(
          reader,
          &format!("{prefix}.downsample.0"),
          in_channels,
          out_channels,
          1,
          stride,
          0,
        )?,
        bn: BatchNorm2d::load(
          reader,
          &format!("{prefix}.downsample.1"),
          out_channels,
        )?,
      })
    } else {
      None
    };

    Ok(Self {
      conv1,
      bn1,
      conv2,
      bn2,
      downsample,
    })
  }

  fn forward(&self, x: ArrayView4<f32>) -> Result<Array4<f32>, Error> {
    let mut out = self.conv1.forward(x)?;
    self.bn1.apply(&mut out);
    out.mapv_inplace(relu);

    let mut out = self.conv2.forward(out.view())?;
    self.bn2.apply(&mut out);

    match &self.downsample {
      Some(downsample) => {
        let mut identity = downsample.conv.forward(x)?;
        downsample.bn.apply(&mut identity);
        out += &identity;
      }
      None => out += &x,
    }

    out.mapv_inplace(relu);

    Ok(out)
  }
}

/// Convolutional trunk of a ResNet, ending in global average pooling.
#[derive(Clone, Debug)]
pub(crate) struct ResNet {
  conv1: Conv2d,
  bn1: BatchNorm2d,
  stages: Vec<Vec<BasicBlock>>,
}

impl ResNet {
  pub(crate) fn load(
    reader: &mut ParameterReader,
    config: &NetworkConfig,
  ) -> Result<Self, Error> {
    let conv1 = Conv2d::load(reader, "conv1", 3, config.width, 7, 2, 3)?;
    let bn1 = BatchNorm2d::load(reader, "bn1", config.width)?;

    let mut stages = Vec::with_capacity(config.blocks.len());

    let mut in_channels = config.width;

    for (stage, &blocks) in config.blocks.iter().enumerate() {
      let out_channels = config.stage_channels(stage);

      let mut layer = Vec::with_capacity(blocks);

      for block in 0..blocks {
        let prefix = format!("layer{}.{block}", stage + 1);

        layer.push(if block == 0 {
          BasicBlock::load(
            reader,
            &prefix,
            in_channels,
            out_channels,
            NetworkConfig::stride(stage),
            config.downsamples(stage, in_channels),
          )?
        } else {
          BasicBlock::load(
            reader,
            &prefix,
            out_channels,
            out_channels,
            1,
            false,
          )?
        });
      }

      stages.push(layer);

      in_channels = out_channels;
    }

    Ok(Self { conv1, bn1, stages })
  }

  /// `(N, 3, H, W) -> (N, features)`
  pub(crate) fn forward(
    &self,
    input: ArrayView4<f32>,
  ) -> Result<Array2<f32>, Error> {
    let mut x = self.conv1.forward(input)?;
    self.bn1.apply(&mut x);
    x.mapv_inplace(relu);

    let mut x = max_pool(x.view());

    for block in self.stages.iter().flatten() {
      x = block.forward(x.view())?;
    }

    Ok(global_average_pool(x.view()))
  }
}
