/// Architecture of the classifier: a ResNet trunk of `BasicBlock` stages
/// followed by a `Linear -> ReLU -> Linear` head.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct NetworkConfig {
  pub(crate) width: usize,
  pub(crate) blocks: [usize; 4],
  pub(crate) hidden: usize,
  pub(crate) classes: usize,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      width: 64,
      blocks: [2, 2, 2, 2],
      hidden: 256,
      classes: 6,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ParameterKind {
  Weight { fan_in: usize },
  Bias { fan_in: usize },
  Ones,
  Zeros,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Parameter {
  pub(crate) name: String,
  pub(crate) shape: Vec<usize>,
  pub(crate) kind: ParameterKind,
}

impl NetworkConfig {
  pub(crate) fn with_classes(classes: usize) -> Self {
    Self {
      classes,
      ..Default::default()
    }
  }

  pub(crate) fn stage_channels(&self, stage: usize) -> usize {
    self.width << stage
  }

  pub(crate) fn features(&self) -> usize {
    self.stage_channels(3)
  }

  /// Every tensor a checkpoint for this architecture holds, head first.
  pub(crate) fn parameters(&self) -> Vec<Parameter> {
    let mut parameters = Vec::new();

    linear(&mut parameters, "fc.0", self.features(), self.hidden);
    linear(&mut parameters, "fc.2", self.hidden, self.classes);

    conv(&mut parameters, "conv1", 3, self.width, 7);
    batch_norm(&mut parameters, "bn1", self.width);

    let mut in_channels = self.width;

    for (stage, &blocks) in self.blocks.iter().enumerate() {
      let out_channels = self.stage_channels(stage);

      for block in 0..blocks {
        let prefix = format!("layer{}.{block}", stage + 1);

        let block_in = if block == 0 { in_channels } else { out_channels };

        conv(
          &mut parameters,
          &format!("{prefix}.conv1"),
          block_in,
          out_channels,
          3,
        );
        batch_norm(&mut parameters, &format!("{prefix}.bn1"), out_channels);
        conv(
          &mut parameters,
          &format!("{prefix}.conv2"),
          out_channels,
          out_channels,
          3,
        );
        batch_norm(&mut parameters, &format!("{prefix}.bn2"), out_channels);

        if block == 0 && self.downsamples(stage, block_in) {
          conv(
            &mut parameters,
            &format!("{prefix}.downsample.0"),
            block_in,
            out_channels,
            1,
          );
          batch_norm(
            &mut parameters,
            &format!("{prefix}.downsample.1"),
            out_channels,
          );
        }
      }

      in_channels = out_channels;
    }

    parameters
  }

  pub(crate) fn stride(stage: usize) -> usize {
    if stage == 0 {
      1
    } else {
      2
    }
  }

  pub(crate) fn downsamples(&self, stage: usize, in_channels: usize) -> bool {
    Self::stride(stage) != 1 || in_channels != self.stage_channels(stage)
  }
}

fn linear(
  parameters: &mut Vec<Parameter>,
  prefix: &str,
  inputs: usize,
  outputs: usize,
) {
  parameters.push(Parameter {
    name: format!("{prefix}.weight"),
    shape: vec![outputs, inputs],
    kind: ParameterKind::Weight { fan_in: inputs },
  });

  parameters.push(Parameter {
    name: format!("{prefix}.bias"),
    shape: vec![outputs],
    kind: ParameterKind::Bias { fan_in: inputs },
  });
}

fn conv(
  parameters: &mut Vec<Parameter>,
  prefix: &str,
  inputs: usize,
  outputs: usize,
  kernel: usize,
) {
  parameters.push(Parameter {
    name: format!("{prefix}.weight"),
    shape: vec![outputs, inputs, kernel, kernel],
    kind: ParameterKind::Weight {
      fan_in: inputs * kernel * kernel,
    },
  });
}

fn batch_norm(parameters: &mut Vec<Parameter>, prefix: &str, channels: usize) {
  for (suffix, kind) in [
    ("weight", ParameterKind::Ones),
    ("bias", ParameterKind::Zeros),
    ("running_mean", ParameterKind::Zeros),
    ("running_var", ParameterKind::Ones),
  ] {
    parameters.push(Parameter {
      name: format!("{prefix}.{suffix}"),
      shape: vec![channels],
      kind,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resnet18_parameter_count() {
    let parameters = NetworkConfig::default().parameters();

    let learned = parameters
      .iter()
      .filter(|parameter| !parameter.name.contains("running_"))
      .map(|parameter| parameter.shape.iter().product::<usize>())
      .sum::<usize>();

    // torchvision resnet18 without its fc layer, plus the two-layer head.
    assert_eq!(learned, 11_176_512 + 512 * 256 + 256 + 256 * 6 + 6);
  }

  #[test]
  fn head_comes_first() {
    let parameters = NetworkConfig::default().parameters();

    let names = parameters
      .iter()
      .take(4)
      .map(|parameter| parameter.name.as_str())
      .collect::<Vec<_>>();

    assert_eq!(names, ["fc.0.weight", "fc.0.bias", "fc.2.weight", "fc.2.bias"]);
    assert_eq!(parameters[2].shape, [6, 256]);
  }

  #[test]
  fn only_first_block_of_later_stages_downsamples() {
    let parameters = NetworkConfig::default().parameters();

    let downsampled = parameters
      .iter()
      .filter(|parameter| parameter.name.ends_with("downsample.0.weight"))
      .map(|parameter| parameter.name.as_str())
      .collect::<Vec<_>>();

    assert_eq!(
      downsampled,
      [
        "layer2.0.downsample.0.weight",
        "layer3.0.downsample.0.weight",
        "layer4.0.downsample.0.weight"
      ]
    );
  }

  #[test]
  fn features_follow_width() {
    assert_eq!(NetworkConfig::default().features(), 512);

    let narrow = NetworkConfig {
      width: 2,
      ..Default::default()
    };

    assert_eq!(narrow.features(), 16);
  }
}
