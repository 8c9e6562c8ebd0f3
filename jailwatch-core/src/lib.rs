pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod jails;
pub mod log_tail;
pub mod logging;
pub mod paths;
pub mod report;
pub mod tools;
pub mod types;

pub use error::{Error, Result};

use std::path::{Path, PathBuf};

pub fn bootstrap(config_override: Option<&Path>, read_only: bool) -> anyhow::Result<config::Config> {
  let base = paths::base_dir();
  let config_path: PathBuf = config_override
    .map(Path::to_path_buf)
    .unwrap_or_else(|| paths::config_path(&base));

  let cfg = if read_only {
    config::load_or_default_readonly(&config_path)?
  } else {
    config::load_or_create_default(&config_path)?
  };

  if let Err(e) = logging::init_file_and_stderr(
    &paths::logs_dir(&base),
    &cfg.logging.level,
    cfg.logging.retention_days,
  ) {
    logging::init_stderr_only(&cfg.logging.level);
    tracing::warn!(error = %e, "file logging unavailable; logging to stderr only");
  }

  Ok(cfg)
}

pub fn run_cli(cli: console::Cli) -> anyhow::Result<()> {
  let cfg = bootstrap(cli.config.as_deref(), cli.dry_run)?;
  tracing::debug!(command = ?cli.command, dry_run = cli.dry_run, "jailwatch starting");

  let client = client::Fail2banClient::new(&cfg.client);
  console::run_command(&cfg, &cli, &client, cli.dry_run)
}
