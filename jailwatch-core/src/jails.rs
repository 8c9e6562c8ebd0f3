use crate::error::{Error, Result};
use crate::types::JailSet;
use serde::Serialize;

pub fn validate_jail(name: &str, jails: &JailSet) -> Result<()> {
  if jails.contains(name) {
    return Ok(());
  }
  Err(Error::JailNotFound {
    name: name.to_string(),
    known: jails.names().to_vec(),
  })
}

// Reads the "Jail list:" row of `fail2ban-client status`.
pub fn parse_jail_list(output: &str) -> JailSet {
  for line in output.lines() {
    if let Some(value) = value_after(line, "Jail list:") {
      return JailSet::new(value.split(',').map(str::trim));
    }
  }
  JailSet::default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JailStatus {
  pub currently_failed: u64,
  pub total_failed: u64,
  pub currently_banned: u64,
  pub total_banned: u64,
  pub files: Vec<String>,
  pub banned_ips: Vec<String>,
}

pub fn parse_jail_status(output: &str) -> JailStatus {
  let mut st = JailStatus::default();
  for line in output.lines() {
    if let Some(v) = value_after(line, "Currently failed:") {
      st.currently_failed = v.parse().unwrap_or(0);
    } else if let Some(v) = value_after(line, "Total failed:") {
      st.total_failed = v.parse().unwrap_or(0);
    } else if let Some(v) = value_after(line, "Currently banned:") {
      st.currently_banned = v.parse().unwrap_or(0);
    } else if let Some(v) = value_after(line, "Total banned:") {
      st.total_banned = v.parse().unwrap_or(0);
    } else if let Some(v) = value_after(line, "File list:") {
      st.files = v.split_whitespace().map(str::to_string).collect();
    } else if let Some(v) = value_after(line, "Banned IP list:") {
      st.banned_ips = v.split_whitespace().map(str::to_string).collect();
    }
  }
  st
}

pub fn render_jail_status(jail: &str, st: &JailStatus) -> String {
  let rows: Vec<(&str, String)> = vec![
    ("Jail", jail.to_string()),
    ("Currently failed", st.currently_failed.to_string()),
    ("Total failed", st.total_failed.to_string()),
    ("Currently banned", st.currently_banned.to_string()),
    ("Total banned", st.total_banned.to_string()),
    ("Log files", join_or_dash(&st.files)),
    ("Banned IPs", join_or_dash(&st.banned_ips)),
  ];

  let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
  let mut out = String::new();
  for (k, v) in rows {
    out.push_str(&format!("{k:<width$}  {v}\n"));
  }
  out
}

fn join_or_dash(items: &[String]) -> String {
  if items.is_empty() {
    "-".to_string()
  } else {
    items.join(" ")
  }
}

fn value_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
  line.find(key).map(|i| line[i + key.len()..].trim())
}
