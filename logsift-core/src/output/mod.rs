pub mod csv;
pub mod json;
pub mod table;
pub mod text;

use crate::error::{Result, SiftError};
use crate::event::{parse_iso8601, Event};
use crate::store::EventStore;
use serde::{Deserialize, Serialize};
use std::path::Path;

use csv::CsvOutput;
use json::JsonOutput;
use text::TextOutput;

pub use csv::read_csv_events;
pub use json::{read_json_events, verdicts_to_json};
pub use table::{events_table, timeline_table, verdict_table, Table};

/// Column order shared by every export format.
pub const EXPORT_FIELDS: [&str; 7] = ["time", "event", "user", "ip", "path", "pid", "format"];

/// Serializable view of one Event, with the time rendered as ISO-8601.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub time: String,
    pub event: Option<String>,
    pub user: Option<String>,
    pub ip: Option<String>,
    pub path: Option<String>,
    pub pid: Option<u64>,
    pub format: String,
}

impl From<&Event> for ExportRecord {
    fn from(event: &Event) -> Self {
        Self {
            time: event.time_iso(),
            event: event.event.clone(),
            user: event.user.clone(),
            ip: event.ip.clone(),
            path: event.path.clone(),
            pid: event.pid,
            format: event.format.clone(),
        }
    }
}

impl ExportRecord {
    /// Cell values in [`EXPORT_FIELDS`] order; `None` marks an absent value.
    pub fn cells(&self) -> [Option<String>; 7] {
        [
            Some(self.time.clone()),
            self.event.clone(),
            self.user.clone(),
            self.ip.clone(),
            self.path.clone(),
            self.pid.map(|p| p.to_string()),
            Some(self.format.clone()),
        ]
    }

    pub fn into_event(self) -> Result<Event> {
        let time = parse_iso8601(&self.time).ok_or_else(|| {
            SiftError::InvalidRecord(format!("unreadable time value '{}'", self.time))
        })?;
        Ok(Event {
            time,
            event: self.event,
            user: self.user,
            ip: self.ip,
            path: self.path,
            pid: self.pid,
            format: self.format,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    Text,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            "txt" | "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }

    fn generator(&self) -> &'static dyn OutputGenerator {
        match self {
            OutputFormat::Json => &JsonOutput,
            OutputFormat::Csv => &CsvOutput,
            OutputFormat::Text => &TextOutput,
        }
    }
}

pub trait OutputGenerator {
    fn generate(&self, records: &[ExportRecord]) -> Result<String>;
    fn file_extension(&self) -> &str;
}

pub fn export_records(store: &EventStore) -> Vec<ExportRecord> {
    store.events().iter().map(ExportRecord::from).collect()
}

/// Renders every stored Event in the requested format.
pub fn export_events(store: &EventStore, format: OutputFormat) -> Result<String> {
    format.generator().generate(&export_records(store))
}

pub fn save_report(content: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("csv"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::from_str("txt"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::from_str("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::from_str("html"), None);
    }

    #[test]
    fn test_generators_match_extension() {
        for format in [OutputFormat::Json, OutputFormat::Csv, OutputFormat::Text] {
            assert_eq!(format.generator().file_extension(), format.extension());
        }
    }

    #[test]
    fn test_record_cells_mark_absent_values() {
        let event = Event {
            time: 0,
            event: None,
            user: Some("root".to_string()),
            ip: None,
            path: None,
            pid: Some(1),
            format: "TXT".to_string(),
        };
        let cells = ExportRecord::from(&event).cells();
        assert_eq!(cells[0].as_deref(), Some("1970-01-01T00:00:00Z"));
        assert_eq!(cells[1], None);
        assert_eq!(cells[2].as_deref(), Some("root"));
        assert_eq!(cells[5].as_deref(), Some("1"));
    }

    #[test]
    fn test_save_report_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("logs.json");
        save_report("[]", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }
}
