use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub client: ClientConfig,
  pub regex: RegexConfig,
  pub logs: LogsConfig,
  pub report: ReportConfig,
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
  #[serde(default = "default_client_binary")]
  pub binary: String,

  #[serde(default)]
  pub socket: String,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      binary: default_client_binary(),
      socket: String::new(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexConfig {
  #[serde(default = "default_regex_binary")]
  pub binary: String,

  #[serde(default = "default_filter_dir")]
  pub filter_dir: String,
}

impl Default for RegexConfig {
  fn default() -> Self {
    Self {
      binary: default_regex_binary(),
      filter_dir: default_filter_dir(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
  #[serde(default = "default_log_path")]
  pub path: String,

  #[serde(default = "default_tail_lines")]
  pub lines: usize,

  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
}

impl Default for LogsConfig {
  fn default() -> Self {
    Self {
      path: default_log_path(),
      lines: default_tail_lines(),
      poll_interval_ms: default_poll_interval_ms(),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
  // Reduce remaining time modulo one day, as older releases displayed it.
  #[serde(default)]
  pub legacy_day_wrap: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
    }
  }
}

fn default_client_binary() -> String {
  "fail2ban-client".to_string()
}

fn default_regex_binary() -> String {
  "fail2ban-regex".to_string()
}

fn default_filter_dir() -> String {
  "/etc/fail2ban/filter.d".to_string()
}

fn default_log_path() -> String {
  "/var/log/fail2ban.log".to_string()
}

fn default_tail_lines() -> usize {
  20
}

fn default_poll_interval_ms() -> u64 {
  1000
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub client: Option<ClientConfig>,

  #[serde(default)]
  pub regex: Option<RegexConfig>,

  #[serde(default)]
  pub logs: Option<LogsConfig>,

  #[serde(default)]
  pub report: Option<ReportConfig>,

  #[serde(default)]
  pub logging: Option<LoggingConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(c) = self.client {
      cfg.client = c;
    }
    if let Some(r) = self.regex {
      cfg.regex = r;
    }
    if let Some(l) = self.logs {
      cfg.logs = l;
    }
    if let Some(r) = self.report {
      cfg.report = r;
    }
    if let Some(l) = self.logging {
      cfg.logging = l;
    }

    if cfg.logs.poll_interval_ms == 0 {
      tracing::warn!("logs.poll_interval_ms must be > 0; using default");
      cfg.logs.poll_interval_ms = default_poll_interval_ms();
    }
    if cfg.logs.lines == 0 {
      tracing::warn!("logs.lines must be > 0; using default");
      cfg.logs.lines = default_tail_lines();
    }
    if cfg.client.binary.trim().is_empty() {
      tracing::warn!("client.binary is empty; using default");
      cfg.client.binary = default_client_binary();
    }

    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.client.is_none()
      || self.regex.is_none()
      || self.logs.is_none()
      || self.report.is_none()
      || self.logging.is_none()
  }
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, true)
}

pub fn load_or_default_readonly(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, false)
}

fn load_impl(path: &Path, allow_writes: bool) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  if allow_writes {
    fs::create_dir_all(parent)?;
  }

  if !path.exists() {
    let cfg = Config::default();
    if allow_writes {
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
    }
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  match toml::from_str::<ConfigFile>(&raw) {
    Ok(file) => {
      let upgrade = file.needs_upgrade();
      let cfg = file.normalize();
      if allow_writes && upgrade {
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!("jailwatch: missing config sections written to {}", path.display());
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      if allow_writes {
        let backup = parent.join(format!("config.toml.bad-{}", unix_secs()));
        let _ = fs::rename(path, &backup);
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "jailwatch: invalid config at {} (backed up to {}): {e}",
          path.display(),
          backup.display()
        );
      } else {
        eprintln!(
          "jailwatch: invalid config at {}; using defaults in read-only mode (--dry-run): {e}",
          path.display()
        );
      }
      Ok(cfg)
    }
  }
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    client: Some(cfg.client.clone()),
    regex: Some(cfg.regex.clone()),
    logs: Some(cfg.logs.clone()),
    report: Some(cfg.report.clone()),
    logging: Some(cfg.logging.clone()),
  }
}

fn unix_secs() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}
