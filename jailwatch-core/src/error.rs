use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("jail '{name}' not found; known jails: {}", format_known(.known))]
  JailNotFound { name: String, known: Vec<String> },

  #[error("`{command}` failed ({status}): {stderr}")]
  Upstream {
    command: String,
    status: String,
    stderr: String,
  },

  #[error("`{binary}` not found on PATH; is fail2ban installed?")]
  ToolMissing { binary: String },

  #[error("I/O error on {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

fn format_known(known: &[String]) -> String {
  if known.is_empty() {
    "(none)".to_string()
  } else {
    known.join(", ")
  }
}
