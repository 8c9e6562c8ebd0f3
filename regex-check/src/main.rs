use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
  name = "jailwatch-regex",
  about = "Test a fail2ban filter against a log file",
  version = env!("CARGO_PKG_VERSION"),
)]
struct Args {
  /// Config file (default: <state dir>/config.toml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// List filters available in the configured filter directory
  #[arg(long, conflicts_with_all = ["log", "filter"])]
  list: bool,

  /// Pass --print-all-matched to the tester
  #[arg(long)]
  print_matched: bool,

  /// Log file to test
  #[arg(required_unless_present = "list")]
  log: Option<PathBuf>,

  /// Filter name (e.g. `sshd`) or path to a filter file
  #[arg(required_unless_present = "list")]
  filter: Option<String>,
}

fn main() -> anyhow::Result<()> {
  let args = Args::parse();
  // Nothing here mutates daemon state; read the config without creating it.
  let cfg = jailwatch_core::bootstrap(args.config.as_deref(), true)?;
  let filter_dir = Path::new(&cfg.regex.filter_dir);

  if args.list {
    let filters = regex_check::list_filters(filter_dir);
    if filters.is_empty() {
      println!("No filters found in {}.", filter_dir.display());
    }
    for f in filters {
      println!("{f}");
    }
    return Ok(());
  }

  let (Some(log), Some(filter)) = (args.log, args.filter) else {
    anyhow::bail!("expected: jailwatch-regex <LOG> <FILTER>");
  };

  let filter_path = regex_check::resolve_filter(filter_dir, &filter)?;
  let run = regex_check::run(&cfg.regex.binary, &log, &filter_path, args.print_matched)
    .context("regex test")?;

  print!("{}", run.output);
  match run.summary {
    Some(s) => println!(
      "Summary: {} matched, {} missed, {} ignored of {} lines",
      s.matched, s.missed, s.ignored, s.total
    ),
    None => println!("Summary: tester output had no `Lines:` row"),
  }
  Ok(())
}
