use super::*;

/// Named network parameters, as stored on disk.
#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct Checkpoint {
  tensors: BTreeMap<String, ArrayD<f32>>,
}

impl Checkpoint {
  /// Fills every parameter of `config`: weights and biases uniform in
  /// `±1/sqrt(fan_in)`, batch norms as the identity.
  pub(crate) fn initialize(config: &NetworkConfig, seed: u64) -> Self {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut checkpoint = Self::default();

    for parameter in config.parameters() {
      let shape = parameter.shape.as_slice();

      let tensor = match parameter.kind {
        ParameterKind::Weight { fan_in } | ParameterKind::Bias { fan_in } => {
          let bound = 1.0 / (fan_in as f32).sqrt();
          ArrayD::random_using(shape, Uniform::new(-bound, bound), &mut rng)
        }
        ParameterKind::Ones => ArrayD::ones(shape),
        ParameterKind::Zeros => ArrayD::zeros(shape),
      };

      checkpoint.insert(parameter.name, tensor);
    }

    checkpoint
  }

  pub(crate) fn insert(
    &mut self,
    name: impl Into<String>,
    tensor: ArrayD<f32>,
  ) {
    self.tensors.insert(name.into(), tensor);
  }

  #[cfg(test)]
  pub(crate) fn remove(&mut self, name: &str) -> Option<ArrayD<f32>> {
    self.tensors.remove(name)
  }

  pub(crate) fn len(&self) -> usize {
    self.tensors.len()
  }

  pub(crate) fn load(path: &Path) -> Result<Self, Error> {
    let malformed = |source: Box<dyn std::error::Error + Send + Sync>| {
      Error::CheckpointMalformed {
        path: path.into(),
        source,
      }
    };

    let file = File::open(path).map_err(|error| match error.kind() {
      io::ErrorKind::NotFound => Error::CheckpointMissing { path: path.into() },
      _ => malformed(error.into()),
    })?;

    serde_json::from_reader(BufReader::new(file))
      .map_err(|error| malformed(error.into()))
  }

  pub(crate) fn save(&self, path: &Path) -> Result {
    let file = File::create(path).with_context(|| {
      format!("failed to create checkpoint file `{}`", path.display())
    })?;

    serde_json::to_writer(BufWriter::new(file), self)
      .context("failed to serialize checkpoint")?;

    Ok(())
  }

  pub(crate) fn reader(&self) -> ParameterReader<'_> {
    ParameterReader {
      checkpoint: self,
      consumed: BTreeSet::new(),
    }
  }
}

/// Pulls tensors out of a checkpoint by name, checking each against the
/// shape the architecture expects.
pub(crate) struct ParameterReader<'a> {
  checkpoint: &'a Checkpoint,
  consumed: BTreeSet<&'a str>,
}

impl<'a> ParameterReader<'a> {
  pub(crate) fn take<D: Dimension>(
    &mut self,
    name: &str,
    shape: &[usize],
  ) -> Result<Array<f32, D>, Error> {
    let (key, tensor) =
      self.checkpoint.tensors.get_key_value(name).ok_or_else(|| {
        Error::CheckpointShapeMismatch(Mismatch::Missing { name: name.into() })
      })?;

    if tensor.shape() != shape {
      return Err(Error::CheckpointShapeMismatch(Mismatch::Shape {
        name: name.into(),
        expected: Shape(shape.to_vec()),
        found: Shape(tensor.shape().to_vec()),
      }));
    }

    self.consumed.insert(key.as_str());

    Ok(tensor.clone().into_dimensionality::<D>()?)
  }

  /// Fails on any tensor the architecture never asked for. Batch-norm step
  /// counters carry no inference state and are skipped.
  pub(crate) fn finish(self) -> Result<(), Error> {
    match self.checkpoint.tensors.keys().find(|name| {
      !self.consumed.contains(name.as_str())
        && !name.ends_with("num_batches_tracked")
    }) {
      Some(name) => Err(Error::CheckpointShapeMismatch(Mismatch::Unexpected {
        name: name.clone(),
      })),
      None => Ok(()),
    }
  }
}
