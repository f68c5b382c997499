use super::{ExportRecord, OutputGenerator};
use crate::detector::{AnomalyReport, EnsembleConfidence};
use crate::error::Result;
use crate::event::{iso8601, Event};
use serde::Serialize;

pub struct JsonOutput;

impl OutputGenerator for JsonOutput {
    fn generate(&self, records: &[ExportRecord]) -> Result<String> {
        Ok(serde_json::to_string_pretty(records)?)
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}

/// Parses a JSON export back into Events.
pub fn read_json_events(content: &str) -> Result<Vec<Event>> {
    let records: Vec<ExportRecord> = serde_json::from_str(content)?;
    records.into_iter().map(ExportRecord::into_event).collect()
}

#[derive(Serialize)]
struct VerdictRecord {
    window_start: String,
    count: u64,
    zscore: f64,
    is_outlier_z: bool,
    ensemble_score: f64,
    is_outlier_ensemble: bool,
    ensemble_confidence: EnsembleConfidence,
}

/// Verdict list with `window_start` rendered as ISO-8601. Every record
/// carries the report's ensemble confidence.
pub fn verdicts_to_json(report: &AnomalyReport) -> Result<String> {
    let records: Vec<VerdictRecord> = report
        .verdicts
        .iter()
        .map(|verdict| VerdictRecord {
            window_start: iso8601(verdict.window_start),
            count: verdict.count,
            zscore: verdict.zscore,
            is_outlier_z: verdict.is_outlier_z,
            ensemble_score: verdict.ensemble_score,
            is_outlier_ensemble: verdict.is_outlier_ensemble,
            ensemble_confidence: report.ensemble_confidence,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}
