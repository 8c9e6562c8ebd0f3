use crate::client::DaemonClient;
use crate::config::Config;
use crate::jails::{self, validate_jail};
use crate::log_tail::{self, LineFilter, LogFollower};
use crate::report::{self, DurationStyle};
use crate::tools::ToolCheck;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
  name = "jailwatch",
  about = "Shorthand front end for fail2ban-client",
  version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
  /// Print what would change without touching the daemon or writing config
  #[arg(long, global = true)]
  pub dry_run: bool,

  /// Config file (default: <state dir>/config.toml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  /// Output format
  #[arg(short, long, value_enum, default_value = "table", global = true)]
  pub format: OutputFormat,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  Table,
  Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List jails known to the daemon
  Jails,

  /// Daemon status, or the counters of one jail
  Status { jail: Option<String> },

  /// Report of currently banned IPs (all jails when none given)
  Banned { jails: Vec<String> },

  /// Ban an address in a jail
  Ban { jail: String, ip: String },

  /// Unban an address from one jail, or from every jail
  Unban {
    ip: String,

    #[arg(long)]
    jail: Option<String>,
  },

  /// Show the tail of the daemon log
  Logs {
    /// Number of lines (default from config)
    #[arg(short = 'n', long)]
    lines: Option<usize>,

    /// Keep printing new lines until Ctrl+C
    #[arg(short, long)]
    follow: bool,

    /// Only lines tagged with this jail
    #[arg(long)]
    jail: Option<String>,
  },

  /// Check that the fail2ban tools and log file are present
  Check,
}

pub fn run_command(
  cfg: &Config,
  cli: &Cli,
  client: &dyn DaemonClient,
  dry_run: bool,
) -> anyhow::Result<()> {
  let stdout = std::io::stdout();
  let mut out = stdout.lock();

  match &cli.command {
    Command::Jails => run_jails(client, cli.format, &mut out),
    Command::Status { jail } => run_status(client, jail.as_deref(), cli.format, &mut out),
    Command::Banned { jails } => run_banned(cfg, client, jails, cli.format, &mut out),
    Command::Ban { jail, ip } => run_ban(client, jail, ip, dry_run, &mut out),
    Command::Unban { ip, jail } => run_unban(client, ip, jail.as_deref(), dry_run, &mut out),
    Command::Logs {
      lines,
      follow,
      jail,
    } => run_logs(cfg, *lines, *follow, jail.as_deref(), &mut out),
    Command::Check => run_check(cfg, client, &mut out),
  }
}

fn run_jails(
  client: &dyn DaemonClient,
  format: OutputFormat,
  out: &mut impl Write,
) -> anyhow::Result<()> {
  let set = client.list_jails()?;
  if format == OutputFormat::Json {
    writeln!(out, "{}", serde_json::to_string_pretty(&set)?)?;
    return Ok(());
  }

  if set.is_empty() {
    writeln!(out, "No jails configured.")?;
    return Ok(());
  }
  for name in set.names() {
    writeln!(out, "{name}")?;
  }
  Ok(())
}

fn run_status(
  client: &dyn DaemonClient,
  jail: Option<&str>,
  format: OutputFormat,
  out: &mut impl Write,
) -> anyhow::Result<()> {
  let Some(jail) = jail else {
    client.ping()?;
    let set = client.list_jails()?;
    if format == OutputFormat::Json {
      let v = serde_json::json!({ "running": true, "jails": set });
      writeln!(out, "{}", serde_json::to_string_pretty(&v)?)?;
      return Ok(());
    }
    writeln!(out, "Daemon: running")?;
    writeln!(out, "Jails ({}): {}", set.len(), set.names().join(", "))?;
    return Ok(());
  };

  let known = client.list_jails()?;
  validate_jail(jail, &known)?;
  let st = jails::parse_jail_status(&client.jail_status(jail)?);
  if format == OutputFormat::Json {
    writeln!(out, "{}", serde_json::to_string_pretty(&st)?)?;
  } else {
    write!(out, "{}", jails::render_jail_status(jail, &st))?;
  }
  Ok(())
}

fn run_banned(
  cfg: &Config,
  client: &dyn DaemonClient,
  selected: &[String],
  format: OutputFormat,
  out: &mut impl Write,
) -> anyhow::Result<()> {
  let known = client.list_jails()?;
  let now = chrono::Local::now().naive_local();

  if format == OutputFormat::Json {
    let rep = report::collect(client, &known, selected)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&rep.view(now))?)?;
    return Ok(());
  }

  let style = if cfg.report.legacy_day_wrap {
    DurationStyle::WrapDay
  } else {
    DurationStyle::Days
  };
  let text = report::build_ban_report(client, &known, selected, now, style)?;
  write!(out, "{text}")?;
  Ok(())
}

fn run_ban(
  client: &dyn DaemonClient,
  jail: &str,
  ip: &str,
  dry_run: bool,
  out: &mut impl Write,
) -> anyhow::Result<()> {
  validate_jail(jail, &client.list_jails()?)?;
  if dry_run {
    writeln!(out, "DRY-RUN: would ban {ip} in jail {jail}.")?;
    return Ok(());
  }
  client.ban(jail, ip)?;
  tracing::info!(jail, ip, "address banned");
  writeln!(out, "Banned {ip} in jail {jail}.")?;
  Ok(())
}

fn run_unban(
  client: &dyn DaemonClient,
  ip: &str,
  jail: Option<&str>,
  dry_run: bool,
  out: &mut impl Write,
) -> anyhow::Result<()> {
  match jail {
    Some(jail) => {
      validate_jail(jail, &client.list_jails()?)?;
      if dry_run {
        writeln!(out, "DRY-RUN: would unban {ip} from jail {jail}.")?;
        return Ok(());
      }
      client.unban(jail, ip)?;
      tracing::info!(jail, ip, "address unbanned");
      writeln!(out, "Unbanned {ip} from jail {jail}.")?;
    }
    None => {
      if dry_run {
        writeln!(out, "DRY-RUN: would unban {ip} from all jails.")?;
        return Ok(());
      }
      client.unban_everywhere(ip)?;
      tracing::info!(ip, "address unbanned from all jails");
      writeln!(out, "Unbanned {ip} from all jails.")?;
    }
  }
  Ok(())
}

fn run_logs(
  cfg: &Config,
  lines: Option<usize>,
  follow: bool,
  jail: Option<&str>,
  out: &mut impl Write,
) -> anyhow::Result<()> {
  let path = Path::new(&cfg.logs.path);
  let filter = LineFilter::jail(jail);
  let n = lines.unwrap_or(cfg.logs.lines);

  let tail = log_tail::tail_lines(path, n, &filter)?;
  for line in &tail.lines {
    writeln!(out, "{line}")?;
  }
  if !follow {
    return Ok(());
  }
  out.flush()?;

  let mut follower = LogFollower::starting_at(path, tail.offset, filter);
  let (stop_tx, stop_rx) = mpsc::channel::<()>();
  ctrlc::set_handler(move || {
    let _ = stop_tx.send(());
  })?;

  let tick = Duration::from_millis(cfg.logs.poll_interval_ms);
  tracing::debug!(path = %path.display(), "following log");
  loop {
    if stop_rx.recv_timeout(tick).is_ok() {
      break;
    }
    for line in follower.poll()? {
      writeln!(out, "{line}")?;
    }
    out.flush()?;
  }
  Ok(())
}

fn run_check(cfg: &Config, client: &dyn DaemonClient, out: &mut impl Write) -> anyhow::Result<()> {
  let checks = [
    ToolCheck::binary("daemon client", &cfg.client.binary),
    ToolCheck::binary("regex tester", &cfg.regex.binary),
    ToolCheck::file("daemon log", &cfg.logs.path),
  ];

  let mut failed = 0;
  for c in &checks {
    match &c.found {
      Some(p) => writeln!(out, "ok       {:<14} {}", c.label, p.display())?,
      None => {
        failed += 1;
        writeln!(out, "MISSING  {:<14} {}", c.label, c.target)?;
      }
    }
  }

  if checks[0].ok() {
    match client.ping() {
      Ok(()) => writeln!(out, "ok       {:<14} responding", "daemon")?,
      Err(e) => {
        failed += 1;
        writeln!(out, "FAILED   {:<14} {e}", "daemon")?;
      }
    }
  }

  if failed > 0 {
    anyhow::bail!("{failed} check(s) failed");
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{Error, Result};
  use crate::types::JailSet;
  use std::cell::RefCell;

  #[derive(Default)]
  struct RecordingClient {
    calls: RefCell<Vec<String>>,
  }

  impl RecordingClient {
    fn calls(&self) -> Vec<String> {
      self.calls.borrow().clone()
    }
  }

  impl DaemonClient for RecordingClient {
    fn list_jails(&self) -> Result<JailSet> {
      Ok(JailSet::new(["sshd", "nginx"]))
    }

    fn banned_with_time(&self, jail: &str) -> Result<String> {
      Ok(match jail {
        "sshd" => "1.2.3.4 \t2024-05-01 10:00:00 + 600 = 2024-05-01 10:10:00\n".to_string(),
        _ => String::new(),
      })
    }

    fn jail_status(&self, _jail: &str) -> Result<String> {
      Ok("|  |- Currently failed:\t1\n   |- Currently banned:\t4\n".to_string())
    }

    fn ban(&self, jail: &str, ip: &str) -> Result<()> {
      self.calls.borrow_mut().push(format!("ban {jail} {ip}"));
      Ok(())
    }

    fn unban(&self, jail: &str, ip: &str) -> Result<()> {
      self.calls.borrow_mut().push(format!("unban {jail} {ip}"));
      Ok(())
    }

    fn unban_everywhere(&self, ip: &str) -> Result<()> {
      self.calls.borrow_mut().push(format!("unban * {ip}"));
      Ok(())
    }

    fn ping(&self) -> Result<()> {
      Ok(())
    }
  }

  fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
  }

  #[test]
  fn cli_parses_subcommands() {
    let cli = Cli::try_parse_from(["jailwatch", "--dry-run", "unban", "1.2.3.4", "--jail", "sshd"])
      .unwrap();
    assert!(cli.dry_run);
    assert!(matches!(
      cli.command,
      Command::Unban { ref ip, jail: Some(ref j) } if ip == "1.2.3.4" && j == "sshd"
    ));

    let cli = Cli::try_parse_from(["jailwatch", "banned", "sshd", "nginx", "-f", "json"]).unwrap();
    assert_eq!(cli.format, OutputFormat::Json);
    assert!(matches!(cli.command, Command::Banned { ref jails } if jails.len() == 2));
  }

  #[test]
  fn ban_rejects_unknown_jail() {
    let client = RecordingClient::default();
    let mut buf = Vec::new();
    let err = run_ban(&client, "ghost", "1.2.3.4", false, &mut buf).unwrap_err();
    assert!(matches!(
      err.downcast_ref::<Error>(),
      Some(Error::JailNotFound { .. })
    ));
    assert!(client.calls().is_empty());
  }

  #[test]
  fn ban_dry_run_does_not_call_daemon() {
    let client = RecordingClient::default();
    let mut buf = Vec::new();
    run_ban(&client, "sshd", "1.2.3.4", true, &mut buf).unwrap();
    assert!(client.calls().is_empty());
    assert!(output(buf).starts_with("DRY-RUN"));
  }

  #[test]
  fn dry_run_flag_reaches_command_handlers() {
    let client = RecordingClient::default();
    let cli = Cli::try_parse_from(["jailwatch", "--dry-run", "unban", "1.2.3.4"]).unwrap();
    run_command(&Config::default(), &cli, &client, cli.dry_run).unwrap();
    assert!(client.calls().is_empty());

    let cli = Cli::try_parse_from(["jailwatch", "unban", "1.2.3.4"]).unwrap();
    run_command(&Config::default(), &cli, &client, cli.dry_run).unwrap();
    assert_eq!(client.calls(), vec!["unban * 1.2.3.4"]);
  }

  #[test]
  fn ban_and_unban_reach_daemon() {
    let client = RecordingClient::default();
    let mut buf = Vec::new();
    run_ban(&client, "sshd", "1.2.3.4", false, &mut buf).unwrap();
    run_unban(&client, "1.2.3.4", Some("sshd"), false, &mut buf).unwrap();
    run_unban(&client, "5.6.7.8", None, false, &mut buf).unwrap();
    assert_eq!(
      client.calls(),
      vec!["ban sshd 1.2.3.4", "unban sshd 1.2.3.4", "unban * 5.6.7.8"]
    );
  }

  #[test]
  fn status_of_jail_renders_counters() {
    let client = RecordingClient::default();
    let mut buf = Vec::new();
    run_status(&client, Some("sshd"), OutputFormat::Table, &mut buf).unwrap();
    let text = output(buf);
    assert!(text.contains("Currently banned  4"));
  }

  #[test]
  fn banned_json_contains_records() {
    let client = RecordingClient::default();
    let mut buf = Vec::new();
    run_banned(&Config::default(), &client, &[], OutputFormat::Json, &mut buf).unwrap();
    let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    assert_eq!(v["stats"]["unique_ips"], 1);
    assert_eq!(v["records"][0]["ip"], "1.2.3.4");
    assert_eq!(v["records"][0]["unban_at"], "2024-05-01 10:10:00");
    assert_eq!(v["records"][0]["remaining_secs"], 0);
  }

  #[test]
  fn jails_lists_one_per_line() {
    let client = RecordingClient::default();
    let mut buf = Vec::new();
    run_jails(&client, OutputFormat::Table, &mut buf).unwrap();
    assert_eq!(output(buf), "sshd\nnginx\n");
  }

  #[test]
  fn logs_prints_filtered_tail() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("fail2ban.log");
    std::fs::write(&p, "a [sshd] Ban 1.1.1.1\nb [nginx] Ban 2.2.2.2\nc [sshd] Unban 1.1.1.1\n")
      .unwrap();
    let mut cfg = Config::default();
    cfg.logs.path = p.display().to_string();

    let mut buf = Vec::new();
    run_logs(&cfg, Some(5), false, Some("sshd"), &mut buf).unwrap();
    assert_eq!(output(buf), "a [sshd] Ban 1.1.1.1\nc [sshd] Unban 1.1.1.1\n");
  }
}
