use std::path::{Path, PathBuf};

pub fn find_on_path(binary: &str) -> Option<PathBuf> {
  if binary.contains('/') {
    let p = Path::new(binary);
    return p.is_file().then(|| p.to_path_buf());
  }

  let path = std::env::var_os("PATH")?;
  std::env::split_paths(&path)
    .map(|dir| dir.join(binary))
    .find(|candidate| candidate.is_file())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCheck {
  pub label: &'static str,
  pub target: String,
  pub found: Option<PathBuf>,
}

impl ToolCheck {
  pub fn binary(label: &'static str, binary: &str) -> Self {
    Self {
      label,
      target: binary.to_string(),
      found: find_on_path(binary),
    }
  }

  pub fn file(label: &'static str, path: &str) -> Self {
    let p = Path::new(path);
    Self {
      label,
      target: path.to_string(),
      found: p.is_file().then(|| p.to_path_buf()),
    }
  }

  pub fn ok(&self) -> bool {
    self.found.is_some()
  }
}
