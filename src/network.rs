use super::*;

#[derive(Clone, Debug)]
pub(crate) struct Linear {
  weight: Array2<f32>,
  bias: Array1<f32>,
}

impl Linear {
  fn load(
    reader: &mut ParameterReader,
    prefix: &str,
    inputs: usize,
    outputs: usize,
  ) -> Result<Self, Error> {
    Ok(Self {
      weight: reader
        .take::<Ix2>(&format!("{prefix}.weight"), &[outputs, inputs])?,
      bias: reader.take::<Ix1>(&format!("{prefix}.bias"), &[outputs])?,
    })
  }

  fn forward(&self, input: ArrayView2<f32>) -> Array2<f32> {
    input.dot(&self.weight.t()) + &self.bias
  }
}

/// ResNet trunk with the `Linear -> ReLU -> Linear` classification head.
#[derive(Clone, Debug)]
pub(crate) struct Network {
  trunk: ResNet,
  hidden: Linear,
  output: Linear,
  classes: usize,
}

impl Network {
  /// Builds the network from `checkpoint`. The head is checked before the
  /// trunk, and every tensor must be consumed exactly as `config` lays it
  /// out.
  pub(crate) fn from_checkpoint(
    checkpoint: &Checkpoint,
    config: &NetworkConfig,
  ) -> Result<Self, Error> {
    let mut reader = checkpoint.reader();

    let hidden =
      Linear::load(&mut reader, "fc.0", config.features(), config.hidden)?;

    let output =
      Linear::load(&mut reader, "fc.2", config.hidden, config.classes)?;

    let trunk = ResNet::load(&mut reader, config)?;

    reader.finish()?;

    Ok(Self {
      trunk,
      hidden,
      output,
      classes: config.classes,
    })
  }

  pub(crate) fn load_weights(
    path: &Path,
    config: &NetworkConfig,
  ) -> Result<Self, Error> {
    let checkpoint = Checkpoint::load(path)?;

    info!(
      path = %path.display(),
      tensors = checkpoint.len(),
      "loaded checkpoint"
    );

    Self::from_checkpoint(&checkpoint, config)
  }
}

impl Classifier for Network {
  fn classes(&self) -> usize {
    self.classes
  }

  fn forward(&self, input: ArrayView4<f32>) -> Result<Array2<f32>, Error> {
    let features = self.trunk.forward(input)?;

    let hidden = self.hidden.forward(features.view()).mapv(relu);

    Ok(self.output.forward(hidden.view()))
  }
}

#[cfg(test)]
mod tests {
  use {super::*, ndarray::array, tempdir::TempDir};

  fn tiny(classes: usize) -> NetworkConfig {
    NetworkConfig {
      width: 2,
      blocks: [1, 1, 1, 1],
      hidden: 4,
      classes,
    }
  }

  #[test]
  fn linear_forward() {
    let linear = Linear {
      weight: array![[1.0, 2.0], [0.0, -1.0], [0.5, 0.5]],
      bias: array![0.0, 1.0, -1.0],
    };

    let output = linear.forward(array![[1.0, 1.0], [2.0, 0.0]].view());

    assert_eq!(output, array![[3.0f32, 0.0, 0.0], [2.0, 1.0, 0.0]]);
  }

  #[test]
  fn network_forward() {
    let config = tiny(6);

    let network =
      Network::from_checkpoint(&Checkpoint::initialize(&config, 42), &config)
        .unwrap();

    let scores = network
      .forward(Array4::from_elem((1, 3, 224, 224), 0.1).view())
      .unwrap();

    assert_eq!(scores.dim(), (1, 6));
    assert!(scores.iter().all(|score| score.is_finite()));
    assert_eq!(network.classes(), 6);
  }

  #[test]
  fn forward_is_repeatable() {
    let config = tiny(6);

    let network =
      Network::from_checkpoint(&Checkpoint::initialize(&config, 1), &config)
        .unwrap();

    let input = Array4::from_shape_fn((1, 3, 32, 32), |(_, c, y, x)| {
      (c as f32 - 1.0) * 0.3 + (y as f32 - x as f32) * 0.01
    });

    assert_eq!(
      network.forward(input.view()).unwrap(),
      network.forward(input.view()).unwrap()
    );
  }

  #[test]
  fn rejects_five_class_head() {
    let checkpoint = Checkpoint::initialize(&tiny(5), 42);

    let error = Network::from_checkpoint(&checkpoint, &tiny(6)).unwrap_err();

    assert!(matches!(
      error,
      Error::CheckpointShapeMismatch(Mismatch::Shape {
        ref name,
        ref found,
        ..
      }) if name == "fc.2.weight" && found.0 == [5, 4]
    ));
  }

  #[test]
  fn rejects_missing_trunk_tensor() {
    let config = tiny(6);

    let mut checkpoint = Checkpoint::initialize(&config, 42);

    checkpoint.remove("layer3.0.downsample.1.running_var");

    assert!(matches!(
      Network::from_checkpoint(&checkpoint, &config),
      Err(Error::CheckpointShapeMismatch(Mismatch::Missing { name }))
        if name == "layer3.0.downsample.1.running_var"
    ));
  }

  #[test]
  fn rejects_unexpected_tensor() {
    let config = tiny(6);

    let mut checkpoint = Checkpoint::initialize(&config, 42);

    checkpoint.insert("fc.weight", ArrayD::zeros(vec![1000, 16]));

    assert!(matches!(
      Network::from_checkpoint(&checkpoint, &config),
      Err(Error::CheckpointShapeMismatch(Mismatch::Unexpected { name }))
        if name == "fc.weight"
    ));
  }

  #[test]
  fn tolerates_batch_counters() {
    let config = tiny(6);

    let mut checkpoint = Checkpoint::initialize(&config, 42);

    checkpoint.insert("bn1.num_batches_tracked", ArrayD::zeros(vec![]));

    assert!(Network::from_checkpoint(&checkpoint, &config).is_ok());
  }

  #[test]
  fn save_and_load_weights() {
    let dir = TempDir::new("network").unwrap();

    let path = dir.path().join("best_model.json");

    let config = tiny(6);

    let checkpoint = Checkpoint::initialize(&config, 42);

    checkpoint.save(&path).unwrap();

    let original = Network::from_checkpoint(&checkpoint, &config).unwrap();
    let loaded = Network::load_weights(&path, &config).unwrap();

    let input = Array4::from_elem((1, 3, 40, 40), -0.2);

    assert_eq!(
      original.forward(input.view()).unwrap(),
      loaded.forward(input.view()).unwrap()
    );
  }

  #[test]
  fn load_weights_reports_missing_checkpoint() {
    let dir = TempDir::new("network").unwrap();

    assert!(matches!(
      Network::load_weights(&dir.path().join("best_model.json"), &tiny(6)),
      Err(Error::CheckpointMissing { .. })
    ));
  }
}
