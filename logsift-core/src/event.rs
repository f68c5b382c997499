use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One structured record extracted from a raw log line.
///
/// `time` is the only required field; every other field is independently
/// optional and `None` marks it as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Epoch seconds.
    pub time: i64,
    pub event: Option<String>,
    pub user: Option<String>,
    pub ip: Option<String>,
    pub path: Option<String>,
    pub pid: Option<u64>,
    /// Uppercased type tag of the source the line came from.
    pub format: String,
}

impl Event {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }

    /// ISO-8601 rendering used by every export format.
    pub fn time_iso(&self) -> String {
        iso8601(self.time)
    }
}

/// Renders epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`, falling back to the raw
/// number outside chrono's range.
pub fn iso8601(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => secs.to_string(),
    }
}

/// Inverse of [`iso8601`]. Accepts RFC 3339 strings or bare epoch seconds.
pub fn parse_iso8601(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.timestamp());
    }
    value.parse::<i64>().ok()
}
