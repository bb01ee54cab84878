use super::*;

const EXTENSIONS: [&str; 4] = ["bmp", "jpeg", "jpg", "png"];

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Sample {
  pub(crate) path: PathBuf,
  pub(crate) label: usize,
}

/// Labeled images laid out one directory per class id, e.g.
/// `validation/images/crazing/crazing_1.jpg`.
#[derive(Debug)]
pub(crate) struct Dataset {
  pub(crate) samples: Vec<Sample>,
}

impl Dataset {
  pub(crate) fn load(path: &Path, vocabulary: &Vocabulary) -> Result<Self> {
    let mut samples = Vec::new();

    let mut directories = fs::read_dir(path)
      .with_context(|| format!("failed to read dataset `{}`", path.display()))?
      .map(|entry| entry.map(|entry| entry.path()))
      .collect::<Result<Vec<_>, _>>()?;

    directories.retain(|path| path.is_dir());
    directories.sort();

    for directory in directories {
      let Some(name) = directory.file_name().and_then(|name| name.to_str())
      else {
        bail!("invalid class directory `{}`", directory.display());
      };

      let Some(label) = vocabulary.position(name) else {
        bail!("class directory `{name}` is not in the vocabulary");
      };

      let mut images = fs::read_dir(&directory)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?;

      images.retain(|path| Self::is_image(path));
      images.sort();

      samples.extend(images.into_iter().map(|path| Sample { path, label }));
    }

    if samples.is_empty() {
      bail!("no images found in `{}`", path.display());
    }

    Ok(Self { samples })
  }

  fn is_image(path: &Path) -> bool {
    path.is_file()
      && path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
          EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
        })
        .unwrap_or(false)
  }

  pub(crate) fn len(&self) -> usize {
    self.samples.len()
  }
}
