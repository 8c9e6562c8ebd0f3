
use anyhow::Context;
use jailwatch_core::Error;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

const FILTER_EXTENSIONS: [&str; 2] = ["conf", "local"];

pub fn list_filters(filter_dir: &Path) -> Vec<String> {
  let mut names: Vec<String> = WalkDir::new(filter_dir)
    .max_depth(1)
    .follow_links(true)
    .into_iter()
    .flatten()
    .filter(|e| e.file_type().is_file())
    .filter(|e| {
      e.path()
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| FILTER_EXTENSIONS.contains(&ext))
    })
    .filter_map(|e| {
      e.path()
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
    })
    .collect();

  names.sort();
  names.dedup();
  names
}

// `sshd` -> `<filter_dir>/sshd.conf`, then `sshd.local`.
pub fn resolve_filter(filter_dir: &Path, filter: &str) -> anyhow::Result<PathBuf> {
  let direct = Path::new(filter);
  if direct.is_file() {
    return Ok(direct.to_path_buf());
  }

  for ext in FILTER_EXTENSIONS {
    let candidate = filter_dir.join(format!("{filter}.{ext}"));
    if candidate.is_file() {
      return Ok(candidate);
    }
  }

  let available = list_filters(filter_dir);
  anyhow::bail!(
    "filter '{filter}' not found in {}; available: {}",
    filter_dir.display(),
    if available.is_empty() {
      "(none)".to_string()
    } else {
      available.join(", ")
    }
  )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSummary {
  pub total: u64,
  pub ignored: u64,
  pub matched: u64,
  pub missed: u64,
}

// Lines: N lines, I ignored, M matched, X missed
pub fn parse_summary(output: &str) -> Option<LineSummary> {
  let line = output.lines().find(|l| l.trim_start().starts_with("Lines:"))?;
  let body = line.trim_start().trim_start_matches("Lines:");

  let mut summary = LineSummary {
    total: 0,
    ignored: 0,
    matched: 0,
    missed: 0,
  };
  let mut seen = false;
  for part in body.split(',') {
    let mut it = part.split_whitespace();
    let (Some(n), Some(label)) = (it.next(), it.next()) else {
      continue;
    };
    let Ok(n) = n.parse::<u64>() else {
      continue;
    };
    seen = true;
    match label {
      "lines" => summary.total = n,
      "ignored" => summary.ignored = n,
      "matched" => summary.matched = n,
      "missed" => summary.missed = n,
      _ => {}
    }
  }
  seen.then_some(summary)
}

#[derive(Debug, Clone)]
pub struct RegexRun {
  pub output: String,
  pub summary: Option<LineSummary>,
}

pub fn run(
  binary: &str,
  log: &Path,
  filter: &Path,
  print_matched: bool,
) -> anyhow::Result<RegexRun> {
  if !log.exists() {
    anyhow::bail!("log file not found: {}", log.display());
  }

  let mut cmd = Command::new(binary);
  if print_matched {
    cmd.arg("--print-all-matched");
  }
  cmd.arg(log).arg(filter);
  tracing::debug!(
    binary,
    log = %log.display(),
    filter = %filter.display(),
    "running regex tester"
  );

  let output = cmd.output().map_err(|e| {
    if e.kind() == ErrorKind::NotFound {
      anyhow::Error::new(Error::ToolMissing {
        binary: binary.to_string(),
      })
    } else {
      anyhow::Error::new(e)
    }
  })?;

  let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    return Err(Error::Upstream {
      command: format!("{binary} {} {}", log.display(), filter.display()),
      status: output.status.to_string(),
      stderr: stderr.trim().to_string(),
    })
    .context("filter test failed");
  }

  let summary = parse_summary(&stdout);
  Ok(RegexRun {
    output: stdout,
    summary,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  const REPORT: &str = "\
Running tests
=============

Use   failregex filter file : sshd, basedir: /etc/fail2ban
Use         log file : /var/log/auth.log

Results
=======

Failregex: 56 total

Lines: 1234 lines, 3 ignored, 56 matched, 1175 missed
[processed in 0.21 sec]
";

  #[test]
  fn summary_is_parsed() {
    let s = parse_summary(REPORT).unwrap();
    assert_eq!(
      s,
      LineSummary {
        total: 1234,
        ignored: 3,
        matched: 56,
        missed: 1175
      }
    );
  }

  #[test]
  fn summary_missing_when_no_lines_row() {
    assert!(parse_summary("Results\n=======\n").is_none());
  }

  #[test]
  fn filters_are_listed_and_resolved_by_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("sshd.conf"), "[Definition]\n").unwrap();
    fs::write(dir.path().join("sshd.local"), "[Definition]\n").unwrap();
    fs::write(dir.path().join("nginx-http-auth.conf"), "[Definition]\n").unwrap();
    fs::write(dir.path().join("README"), "x").unwrap();

    assert_eq!(list_filters(dir.path()), vec!["nginx-http-auth", "sshd"]);
    assert_eq!(
      resolve_filter(dir.path(), "sshd").unwrap(),
      dir.path().join("sshd.conf")
    );
  }

  #[test]
  fn unknown_filter_lists_available() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("sshd.conf"), "[Definition]\n").unwrap();
    let err = resolve_filter(dir.path(), "ghost").unwrap_err().to_string();
    assert!(err.contains("ghost"));
    assert!(err.contains("sshd"));
  }

  #[test]
  fn missing_log_is_rejected_before_spawning() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(
      "fail2ban-regex",
      &dir.path().join("missing.log"),
      &dir.path().join("sshd.conf"),
      false,
    )
    .unwrap_err();
    assert!(err.to_string().contains("log file not found"));
  }
}
