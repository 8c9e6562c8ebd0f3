use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BanRecord {
  pub jail: String,
  pub ip: String,
  #[serde(serialize_with = "serialize_ts")]
  pub banned_at: NaiveDateTime,
  // `None` for permanent bans.
  #[serde(serialize_with = "serialize_opt_ts")]
  pub unban_at: Option<NaiveDateTime>,
}

impl BanRecord {
  pub fn remaining_secs(&self, now: NaiveDateTime) -> Option<i64> {
    self.unban_at.map(|t| (t - now).num_seconds())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct JailSet(Vec<String>);

impl JailSet {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut out: Vec<String> = Vec::new();
    for name in names {
      let name = name.into();
      if !name.is_empty() && !out.contains(&name) {
        out.push(name);
      }
    }
    Self(out)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.iter().any(|j| j == name)
  }

  pub fn names(&self) -> &[String] {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportStatistics {
  pub unique_ips: usize,
  #[serde(serialize_with = "serialize_opt_ts")]
  pub oldest: Option<NaiveDateTime>,
  #[serde(serialize_with = "serialize_opt_ts")]
  pub newest: Option<NaiveDateTime>,
  pub jails: Vec<String>,
}

pub fn format_ts(ts: NaiveDateTime) -> String {
  ts.format(TIMESTAMP_FORMAT).to_string()
}

fn serialize_ts<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_str(&format_ts(*ts))
}

fn serialize_opt_ts<S: Serializer>(ts: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
  match ts {
    Some(ts) => s.serialize_str(&format_ts(*ts)),
    None => s.serialize_none(),
  }
}
