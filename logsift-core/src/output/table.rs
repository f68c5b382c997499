use crate::aggregate::Bucket;
use crate::detector::{AnomalyVerdict, EnsembleConfidence};
use crate::event::iso8601;
use crate::store::EventStore;
use serde::Serialize;

use super::{export_records, EXPORT_FIELDS};

const ABSENT: &str = "None";

/// Column-oriented view handed to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fixed-width rendering: columns are right-aligned to their widest cell.
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let format_row = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:>width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join(" ")
                .trim_end()
                .to_string()
        };

        let mut out = format_row(&self.headers);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&format_row(row));
            out.push('\n');
        }
        out
    }
}

pub fn events_table(store: &EventStore) -> Table {
    let mut table = Table::new(&EXPORT_FIELDS);
    for record in export_records(store) {
        table.push_row(
            record
                .cells()
                .into_iter()
                .map(|cell| cell.unwrap_or_else(|| ABSENT.to_string()))
                .collect(),
        );
    }
    table
}

/// Events per window, the series behind the timeline chart.
pub fn timeline_table(buckets: &[Bucket]) -> Table {
    let mut table = Table::new(&["time", "count"]);
    for bucket in buckets {
        table.push_row(vec![bucket.window_start_iso(), bucket.count.to_string()]);
    }
    table
}

/// One row per verdict. `iso_confidence` repeats the report's ensemble confidence.
pub fn verdict_table<'a>(
    verdicts: impl IntoIterator<Item = &'a AnomalyVerdict>,
    confidence: EnsembleConfidence,
) -> Table {
    let mut table = Table::new(&[
        "time",
        "count",
        "zscore",
        "z_outlier",
        "iso_score",
        "iso_outlier",
        "iso_confidence",
    ]);
    for verdict in verdicts {
        table.push_row(vec![
            iso8601(verdict.window_start),
            verdict.count.to_string(),
            format!("{:.3}", verdict.zscore),
            verdict.is_outlier_z.to_string(),
            format!("{:.3}", verdict.ensemble_score),
            verdict.is_outlier_ensemble.to_string(),
            confidence.as_str().to_string(),
        ]);
    }
    table
}
