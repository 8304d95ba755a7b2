//! Display formatting for catalog metadata and playback times.

use anyhow::{Result, anyhow};
use chrono::DateTime;

/// Segments of an ISO-8601 duration (`P#DT#H#M#S`). Absent segments stay `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsoDuration {
  pub days: Option<u64>,
  pub hours: Option<u64>,
  pub minutes: Option<u64>,
  pub seconds: Option<u64>,
}

/// Consume `<digits><unit>` from the front of `rest`, leaving it untouched on mismatch.
fn take_segment(rest: &mut &str, unit: char) -> Option<u64> {
  let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
  if digits == 0 || !rest[digits..].starts_with(unit) {
    return None;
  }
  let value = rest[..digits].parse().ok()?;
  *rest = &rest[digits + unit.len_utf8()..];
  Some(value)
}

/// Parse a duration code such as `PT1H2M3S` or `P1DT2H3M4S`.
///
/// The `P` and `T` markers are mandatory; every segment is optional. Codes without
/// a time part (`P0D`, used for live streams) are rejected.
pub fn parse_duration(code: &str) -> Result<IsoDuration> {
  let invalid = || anyhow!("Not an ISO-8601 time duration: {:?}", code);
  let mut rest = code.trim().strip_prefix('P').ok_or_else(invalid)?;
  let days = take_segment(&mut rest, 'D');
  rest = rest.strip_prefix('T').ok_or_else(invalid)?;
  let hours = take_segment(&mut rest, 'H');
  let minutes = take_segment(&mut rest, 'M');
  let seconds = take_segment(&mut rest, 'S');
  Ok(IsoDuration { days, hours, minutes, seconds })
}

/// Format a duration code for display: `H:MM:SS` with an hour or day segment,
/// `M:SS` without. Days are folded into the hour count.
pub fn format_duration(code: &str) -> Result<String> {
  let d = parse_duration(code)?;
  let seconds = d.seconds.unwrap_or(0);
  let hours = match (d.days, d.hours) {
    (None, None) => None,
    (days, hours) => Some(days.unwrap_or(0) * 24 + hours.unwrap_or(0)),
  };
  Ok(match hours {
    Some(hours) => format!("{}:{:02}:{:02}", hours, d.minutes.unwrap_or(0), seconds),
    None => format!("{}:{:02}", d.minutes.unwrap_or(0), seconds),
  })
}

/// Parse the backend's decimal view-count string. Unparseable counts read as zero.
pub fn parse_view_count(raw: &str) -> u64 {
  raw.trim().parse().unwrap_or(0)
}

/// `2.5M views`, `12.3K views` or `950 views`.
pub fn format_view_count(count: u64) -> String {
  if count >= 1_000_000 {
    format!("{:.1}M views", count as f64 / 1_000_000.0)
  } else if count >= 1_000 {
    format!("{:.1}K views", count as f64 / 1_000.0)
  } else {
    format!("{} views", count)
  }
}

/// Format a playback position in seconds as `m:ss`.
pub fn format_time(secs: f64) -> String {
  let total = if secs.is_finite() && secs > 0.0 { secs.floor() as u64 } else { 0 };
  format!("{}:{:02}", total / 60, total % 60)
}

/// Date part of an RFC 3339 timestamp (`2024-03-01T12:00:00Z` → `2024-03-01`).
pub fn format_published(raw: &str) -> Option<String> {
  DateTime::parse_from_rfc3339(raw.trim()).ok().map(|dt| dt.format("%Y-%m-%d").to_string())
}
