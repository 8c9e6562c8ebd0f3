use crate::client::DaemonClient;
use crate::error::Result;
use crate::jails::validate_jail;
use crate::types::{format_ts, BanRecord, JailSet, ReportStatistics, TIMESTAMP_FORMAT};
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::collections::HashSet;

const SECS_PER_DAY: i64 = 86_400;

// Header label and minimum width.
const COLUMNS: [(&str, usize); 5] = [
  ("#", 3),
  ("Jail", 10),
  ("IP", 15),
  ("Banned At", 19),
  ("Remaining", 9),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationStyle {
  #[default]
  Days,
  WrapDay,
}

#[derive(Debug, Clone, Serialize)]
pub struct BanReport {
  pub stats: ReportStatistics,
  pub records: Vec<BanRecord>,
}

#[derive(Debug, Serialize)]
pub struct RecordView<'a> {
  #[serde(flatten)]
  pub record: &'a BanRecord,
  pub remaining_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReportView<'a> {
  pub stats: &'a ReportStatistics,
  pub records: Vec<RecordView<'a>>,
}

impl BanReport {
  pub fn view(&self, now: NaiveDateTime) -> ReportView<'_> {
    ReportView {
      stats: &self.stats,
      records: self
        .records
        .iter()
        .map(|r| RecordView {
          record: r,
          remaining_secs: r.remaining_secs(now).map(|s| s.max(0)),
        })
        .collect(),
    }
  }
}

/// Parses one listing line: `IP DATE TIME + SECONDS = UNBAN_DATE UNBAN_TIME`.
/// A negative duration (`-1`) marks a permanent ban.
pub fn parse_ban_line(jail: &str, line: &str) -> Option<BanRecord> {
  let fields: Vec<&str> = line.split_whitespace().collect();
  if fields.len() < 5 {
    return None;
  }

  let banned_at =
    NaiveDateTime::parse_from_str(&format!("{} {}", fields[1], fields[2]), TIMESTAMP_FORMAT)
      .ok()?;
  let secs = fields[4].parse::<i64>().ok()?;
  let unban_at = if secs < 0 {
    None
  } else {
    Some(banned_at.checked_add_signed(TimeDelta::try_seconds(secs)?)?)
  };

  Some(BanRecord {
    jail: jail.to_string(),
    ip: fields[0].to_string(),
    banned_at,
    unban_at,
  })
}

pub fn parse_ban_listing(jail: &str, listing: &str) -> Vec<BanRecord> {
  let mut out = Vec::new();
  for line in listing.lines() {
    match parse_ban_line(jail, line) {
      Some(rec) => out.push(rec),
      None => {
        if !line.trim().is_empty() {
          tracing::trace!(jail, line, "skipping unparsable ban line");
        }
      }
    }
  }
  out
}

pub fn aggregate(records: &[BanRecord]) -> ReportStatistics {
  let unique: HashSet<&str> = records.iter().map(|r| r.ip.as_str()).collect();

  let mut jails: Vec<String> = Vec::new();
  for r in records {
    if !jails.contains(&r.jail) {
      jails.push(r.jail.clone());
    }
  }

  ReportStatistics {
    unique_ips: unique.len(),
    oldest: records.iter().map(|r| r.banned_at).min(),
    newest: records.iter().map(|r| r.banned_at).max(),
    jails,
  }
}

/// Ascending unban time, permanent bans last. Ties keep input order.
pub fn order_by_unban(records: &mut [BanRecord]) {
  records.sort_by_key(|r| (r.unban_at.is_none(), r.unban_at));
}

pub fn format_duration(secs: i64) -> String {
  format_duration_with(secs, DurationStyle::Days)
}

pub fn format_duration_with(secs: i64, style: DurationStyle) -> String {
  let secs = secs.max(0);
  let (days, rem) = match style {
    DurationStyle::Days => (secs / SECS_PER_DAY, secs % SECS_PER_DAY),
    DurationStyle::WrapDay => (0, secs % SECS_PER_DAY),
  };
  let hms = format!("{:02}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
  if days > 0 {
    format!("{days}d {hms}")
  } else {
    hms
  }
}

pub fn render_report(
  records: &[BanRecord],
  stats: &ReportStatistics,
  now: NaiveDateTime,
  style: DurationStyle,
) -> String {
  let mut out = String::new();
  out.push_str(&format!("Unique IPs : {}\n", stats.unique_ips));

  let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) else {
    out.push_str(&format!("Jails      : {}\n", join_jails(&stats.jails)));
    out.push_str("No banned IPs.\n");
    return out;
  };

  out.push_str(&format!("Oldest ban : {}\n", format_ts(oldest)));
  out.push_str(&format!("Newest ban : {}\n", format_ts(newest)));
  out.push_str(&format!("Jails      : {}\n", join_jails(&stats.jails)));
  out.push('\n');

  let rows: Vec<[String; 5]> = records
    .iter()
    .enumerate()
    .map(|(i, r)| {
      [
        (i + 1).to_string(),
        r.jail.clone(),
        r.ip.clone(),
        format_ts(r.banned_at),
        match r.remaining_secs(now) {
          Some(secs) => format_duration_with(secs, style),
          None => "permanent".to_string(),
        },
      ]
    })
    .collect();

  let widths = column_widths(&rows);
  let border = border_line(&widths);
  let header = COLUMNS.map(|(label, _)| label.to_string());

  out.push_str(&border);
  out.push_str(&table_row(&header, &widths));
  out.push_str(&border);
  for row in &rows {
    out.push_str(&table_row(row, &widths));
  }
  out.push_str(&border);
  out
}

fn column_widths(rows: &[[String; 5]]) -> [usize; 5] {
  let mut widths = COLUMNS.map(|(label, min)| min.max(label.chars().count()));
  for row in rows {
    for (w, cell) in widths.iter_mut().zip(row.iter()) {
      *w = (*w).max(cell.chars().count());
    }
  }
  widths
}

fn border_line(widths: &[usize; 5]) -> String {
  let mut line = String::from("+");
  for w in widths {
    line.push_str(&"-".repeat(w + 2));
    line.push('+');
  }
  line.push('\n');
  line
}

fn table_row(cells: &[String; 5], widths: &[usize; 5]) -> String {
  let mut line = String::from("|");
  for (cell, w) in cells.iter().zip(widths.iter()) {
    line.push_str(&format!(" {cell:<w$} |"));
  }
  line.push('\n');
  line
}

fn join_jails(jails: &[String]) -> String {
  if jails.is_empty() {
    "-".to_string()
  } else {
    jails.join(", ")
  }
}

// Any failure aborts the whole report.
pub fn collect(
  client: &dyn DaemonClient,
  known: &JailSet,
  selected: &[String],
) -> Result<BanReport> {
  let targets: Vec<String> = if selected.is_empty() {
    known.names().to_vec()
  } else {
    let unique = JailSet::new(selected.iter().cloned());
    for name in unique.names() {
      validate_jail(name, known)?;
    }
    unique.names().to_vec()
  };

  let mut records = Vec::new();
  for jail in &targets {
    let listing = client.banned_with_time(jail)?;
    let parsed = parse_ban_listing(jail, &listing);
    tracing::debug!(jail = %jail, bans = parsed.len(), "collected ban listing");
    records.extend(parsed);
  }

  order_by_unban(&mut records);
  let mut stats = aggregate(&records);
  stats.jails = targets;

  Ok(BanReport { stats, records })
}

pub fn build_ban_report(
  client: &dyn DaemonClient,
  known: &JailSet,
  selected: &[String],
  now: NaiveDateTime,
  style: DurationStyle,
) -> Result<String> {
  let report = collect(client, known, selected)?;
  Ok(render_report(&report.records, &report.stats, now, style))
}
