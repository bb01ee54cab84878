use super::*;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct Class {
  pub(crate) id: String,
  pub(crate) label: String,
}

impl Class {
  fn new(id: &str, label: &str) -> Self {
    Self {
      id: id.into(),
      label: label.into(),
    }
  }
}

/// Ordered class list. Index `i` names output `i` of the classification
/// head, so the order is fixed by the checkpoint the vocabulary is used
/// with.
///
/// The default carries English labels. `classes/zh.json` holds the same
/// classes in the same order with Chinese labels, for use with `--classes`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Vocabulary {
  classes: Vec<Class>,
}

impl Default for Vocabulary {
  fn default() -> Self {
    Self {
      classes: vec![
        Class::new("crazing", "Crazing"),
        Class::new("inclusion", "Inclusion"),
        Class::new("patches", "Patches"),
        Class::new("pitted_surface", "Pitted surface"),
        Class::new("rolled-in_scale", "Rolled-in scale"),
        Class::new("scratches", "Scratches"),
      ],
    }
  }
}

impl Vocabulary {
  pub(crate) fn new(classes: Vec<Class>) -> Result<Self> {
    if classes.is_empty() {
      bail!("vocabulary must contain at least one class");
    }

    let mut seen = HashSet::new();

    for class in &classes {
      if !seen.insert(class.id.as_str()) {
        bail!("duplicate class id `{}` in vocabulary", class.id);
      }
    }

    Ok(Self { classes })
  }

  pub(crate) fn load(path: &Path) -> Result<Self> {
    let file = File::open(path).with_context(|| {
      format!("failed to open vocabulary file `{}`", path.display())
    })?;

    let classes: Vec<Class> = serde_json::from_reader(BufReader::new(file))
      .context("failed to deserialize vocabulary")?;

    Self::new(classes)
  }

  pub(crate) fn len(&self) -> usize {
    self.classes.len()
  }

  pub(crate) fn get(&self, index: usize) -> Option<&Class> {
    self.classes.get(index)
  }

  pub(crate) fn position(&self, id: &str) -> Option<usize> {
    self.classes.iter().position(|class| class.id == id)
  }

  pub(crate) fn iter(&self) -> impl Iterator<Item = &Class> {
    self.classes.iter()
  }
}

#[cfg(test)]
mod tests {
  use {super::*, tempdir::TempDir};

  #[test]
  fn default_order_matches_head_outputs() {
    let vocabulary = Vocabulary::default();

    let ids = vocabulary
      .iter()
      .map(|class| class.id.as_str())
      .collect::<Vec<_>>();

    assert_eq!(
      ids,
      [
        "crazing",
        "inclusion",
        "patches",
        "pitted_surface",
        "rolled-in_scale",
        "scratches"
      ]
    );

    assert_eq!(vocabulary.position("scratches"), Some(5));
    assert_eq!(vocabulary.position("rust"), None);
  }

  #[test]
  fn chinese_labels_follow_default_order() {
    let classes: Vec<Class> =
      serde_json::from_str(include_str!("../classes/zh.json")).unwrap();

    let vocabulary = Vocabulary::new(classes).unwrap();

    assert!(vocabulary
      .iter()
      .zip(Vocabulary::default().iter())
      .all(|(zh, en)| zh.id == en.id));

    assert_eq!(vocabulary.len(), 6);
    assert_eq!(vocabulary.get(3).unwrap().label, "麻点");
    assert_eq!(vocabulary.get(4).unwrap().label, "氧化皮");
  }

  #[test]
  fn rejects_duplicate_ids() {
    let classes = vec![Class::new("a", "A"), Class::new("a", "Also A")];
    assert!(Vocabulary::new(classes).is_err());
  }

  #[test]
  fn rejects_empty() {
    assert!(Vocabulary::new(Vec::new()).is_err());
  }

  #[test]
  fn load_from_file() {
    let dir = TempDir::new("vocabulary").unwrap();

    let path = dir.path().join("classes.json");

    fs::write(
      &path,
      r#"[{"id": "crazing", "label": "裂纹"}, {"id": "scratches", "label": "划痕"}]"#,
    )
    .unwrap();

    let vocabulary = Vocabulary::load(&path).unwrap();

    assert_eq!(vocabulary.len(), 2);
    assert_eq!(vocabulary.get(1).unwrap().label, "划痕");
  }
}
