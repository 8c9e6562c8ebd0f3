use std::path::{Path, PathBuf};

pub fn base_dir() -> PathBuf {
  if let Some(home) = env_path("JAILWATCH_HOME") {
    return home;
  }
  if let Some(state) = env_path("XDG_STATE_HOME") {
    return state.join("jailwatch");
  }
  if let Some(home) = env_path("HOME") {
    return home.join(".local").join("state").join("jailwatch");
  }
  PathBuf::from("/tmp/jailwatch")
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}

fn env_path(key: &str) -> Option<PathBuf> {
  std::env::var_os(key)
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
}
