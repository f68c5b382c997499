use crate::event::Event;
use regex::Regex;
use std::sync::LazyLock;

// Each field has its own pattern; a miss on one never affects the others.
static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[ts:([0-9]+)\]").expect("timestamp pattern"));
static EVENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"EVNT:(XR-\w+)").expect("event pattern"));
static USER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"usr:(\w+)").expect("user pattern"));
static IP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"IP:([0-9.]+)").expect("ip pattern"));
static PATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"=>/(.+)").expect("path pattern"));
static PID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"pid([0-9]+)").expect("pid pattern"));

/// Extracts an [`Event`] from one raw line.
///
/// Returns `None` when the line carries no usable `[ts:<digits>]` token,
/// including digit runs too large for epoch seconds. All other fields are
/// optional and simply left absent when their token is missing.
pub fn parse_line(line: &str, format: &str) -> Option<Event> {
    let time = capture(&TIMESTAMP_RE, line)?.parse::<i64>().ok()?;

    Some(Event {
        time,
        event: capture(&EVENT_RE, line).map(str::to_string),
        user: capture(&USER_RE, line).map(str::to_string),
        ip: capture(&IP_RE, line).map(str::to_string),
        path: capture(&PATH_RE, line).map(|rest| format!("/{}", rest)),
        pid: capture(&PID_RE, line).and_then(|digits| digits.parse::<u64>().ok()),
        format: format.to_string(),
    })
}

/// Parses a batch of lines from one source, dropping lines without a time.
pub fn parse_lines(lines: &[String], format: &str) -> Vec<Event> {
    lines
        .iter()
        .filter_map(|line| parse_line(line, format))
        .collect()
}

fn capture<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
