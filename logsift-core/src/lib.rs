// LogSift Library - forensic log triage
//
// Parses tagged log lines into events, counts them in fixed time windows and
// flags irregular windows with a z-score test and an isolation forest. The
// CLI and any other front end drive it through `Analyzer`.

pub mod aggregate;
pub mod analyzer;
pub mod config;
pub mod detector;
pub mod error;
pub mod event;
#[cfg(feature = "geo")]
pub mod geo;
pub mod input;
pub mod output;
pub mod parser;
pub mod store;

pub use aggregate::{Bucket, TimeBucketAggregator};
pub use analyzer::{AnalysisRun, Analyzer, RunOutcome};
pub use config::Config;
pub use detector::{AnomalyDetector, AnomalyReport, AnomalyVerdict, DetectorConfig, EnsembleConfidence};
pub use error::{Result, SiftError};
pub use event::Event;
pub use input::{format_tag, read_log_file, SourceLines};
pub use output::{export_events, save_report, OutputFormat, Table};
pub use parser::{parse_line, parse_lines};
pub use store::{EventStore, StoreSummary};

/// Analyze raw text with the default configuration.
pub fn analyze_text(text: &str, format: &str) -> Result<RunOutcome> {
    Analyzer::default().run_sources(&[SourceLines::from_text(format, text)])
}
