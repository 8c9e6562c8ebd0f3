use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct LineFilter {
  token: Option<String>,
}

impl LineFilter {
  pub fn jail(jail: Option<&str>) -> Self {
    Self {
      token: jail.map(|j| format!("[{j}]")),
    }
  }

  pub fn matches(&self, line: &str) -> bool {
    match &self.token {
      Some(t) => line.contains(t.as_str()),
      None => true,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Tail {
  pub lines: Vec<String>,
  // Bytes read; a follower started here misses nothing appended since.
  pub offset: u64,
}

pub fn tail_lines(path: &Path, n: usize, filter: &LineFilter) -> Result<Tail> {
  let raw = fs::read(path).map_err(|e| io_err(path, e))?;
  let text = String::from_utf8_lossy(&raw);

  let mut ring: VecDeque<String> = VecDeque::with_capacity(n.min(1024));
  for line in text.lines() {
    if !filter.matches(line) {
      continue;
    }
    if ring.len() == n {
      ring.pop_front();
    }
    if n > 0 {
      ring.push_back(line.to_string());
    }
  }
  Ok(Tail {
    lines: ring.into_iter().collect(),
    offset: raw.len() as u64,
  })
}

/// Poll-and-diff follower: each `poll` returns the complete lines appended
/// since the previous one. A file that shrank is read again from the start.
pub struct LogFollower {
  path: PathBuf,
  offset: u64,
  filter: LineFilter,
}

impl LogFollower {
  pub fn starting_at(path: &Path, offset: u64, filter: LineFilter) -> Self {
    Self {
      path: path.to_path_buf(),
      offset,
      filter,
    }
  }

  pub fn offset(&self) -> u64 {
    self.offset
  }

  pub fn poll(&mut self) -> Result<Vec<String>> {
    let len = match fs::metadata(&self.path) {
      Ok(m) => m.len(),
      // Between rotation and re-creation the file may be briefly absent.
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(io_err(&self.path, e)),
    };

    if len < self.offset {
      tracing::debug!(path = %self.path.display(), "log truncated or rotated; rewinding");
      self.offset = 0;
    }
    if len == self.offset {
      return Ok(Vec::new());
    }

    let mut file = File::open(&self.path).map_err(|e| io_err(&self.path, e))?;
    file
      .seek(SeekFrom::Start(self.offset))
      .map_err(|e| io_err(&self.path, e))?;
    let mut buf = Vec::new();
    file
      .take(len - self.offset)
      .read_to_end(&mut buf)
      .map_err(|e| io_err(&self.path, e))?;

    // Hold back a trailing partial line until its newline arrives.
    let complete = match buf.iter().rposition(|b| *b == b'\n') {
      Some(i) => i + 1,
      None => return Ok(Vec::new()),
    };
    self.offset += complete as u64;

    let text = String::from_utf8_lossy(&buf[..complete]);
    Ok(
      text
        .lines()
        .filter(|l| self.filter.matches(l))
        .map(str::to_string)
        .collect(),
    )
  }
}

fn io_err(path: &Path, source: std::io::Error) -> Error {
  Error::Io {
    path: path.display().to_string(),
    source,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  const SAMPLE: &str = "\
2024-05-01 10:00:00,001 fail2ban.filter [812]: INFO [sshd] Found 1.2.3.4
2024-05-01 10:00:01,002 fail2ban.actions [812]: NOTICE [sshd] Ban 1.2.3.4
2024-05-01 10:00:02,003 fail2ban.actions [812]: NOTICE [nginx] Ban 5.6.7.8
2024-05-01 10:10:01,004 fail2ban.actions [812]: NOTICE [sshd] Unban 1.2.3.4
";

  fn append(path: &Path, text: &str) {
    let mut f = fs::OpenOptions::new().append(true).open(path).unwrap();
    f.write_all(text.as_bytes()).unwrap();
  }

  #[test]
  fn tail_returns_last_lines() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("fail2ban.log");
    fs::write(&p, SAMPLE).unwrap();

    let lines = tail_lines(&p, 2, &LineFilter::default()).unwrap().lines;
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("Unban 1.2.3.4"));
  }

  #[test]
  fn tail_filters_by_jail() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("fail2ban.log");
    fs::write(&p, SAMPLE).unwrap();

    let lines = tail_lines(&p, 10, &LineFilter::jail(Some("nginx"))).unwrap().lines;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("5.6.7.8"));
  }

  #[test]
  fn tail_of_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = tail_lines(&dir.path().join("nope.log"), 5, &LineFilter::default()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
  }

  #[test]
  fn follower_reports_only_appended_complete_lines() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("fail2ban.log");
    fs::write(&p, SAMPLE).unwrap();

    let tail = tail_lines(&p, 1, &LineFilter::default()).unwrap();
    let mut follower = LogFollower::starting_at(&p, tail.offset, LineFilter::default());
    assert!(follower.poll().unwrap().is_empty());

    append(&p, "line one\nline tw");
    assert_eq!(follower.poll().unwrap(), vec!["line one".to_string()]);

    append(&p, "o\n");
    assert_eq!(follower.poll().unwrap(), vec!["line two".to_string()]);
  }

  #[test]
  fn follower_rewinds_after_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("fail2ban.log");
    fs::write(&p, SAMPLE).unwrap();

    let filter = LineFilter::jail(Some("sshd"));
    let tail = tail_lines(&p, 1, &filter).unwrap();
    let mut follower = LogFollower::starting_at(&p, tail.offset, filter);
    fs::write(&p, "x [sshd] Ban 9.9.9.9\ny [nginx] Ban 8.8.8.8\n").unwrap();

    let lines = follower.poll().unwrap();
    assert_eq!(lines, vec!["x [sshd] Ban 9.9.9.9".to_string()]);
    assert_eq!(follower.offset(), fs::metadata(&p).unwrap().len());
  }

  #[test]
  fn lines_appended_after_tail_are_followed() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("fail2ban.log");
    fs::write(&p, SAMPLE).unwrap();

    let tail = tail_lines(&p, 2, &LineFilter::default()).unwrap();
    assert_eq!(tail.offset, SAMPLE.len() as u64);

    // Written after the tail was read but before following starts.
    append(&p, "late [sshd] Ban 7.7.7.7\n");
    let mut follower = LogFollower::starting_at(&p, tail.offset, LineFilter::default());
    assert_eq!(follower.poll().unwrap(), vec!["late [sshd] Ban 7.7.7.7".to_string()]);
  }
}
