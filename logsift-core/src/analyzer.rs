use crate::aggregate::{Bucket, TimeBucketAggregator};
use crate::config::Config;
use crate::detector::{AnomalyDetector, AnomalyReport};
use crate::error::Result;
use crate::input::SourceLines;
use crate::output::{timeline_table, verdict_table, Table};
use crate::store::{EventStore, StoreSummary};
use tracing::{info, warn};

/// Everything one completed analysis produced.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub store: EventStore,
    pub buckets: Vec<Bucket>,
    pub report: AnomalyReport,
}

impl AnalysisRun {
    pub fn summary(&self) -> StoreSummary {
        self.store.summary()
    }

    pub fn timeline_table(&self) -> Table {
        timeline_table(&self.buckets)
    }

    pub fn verdict_table(&self) -> Table {
        verdict_table(&self.report.verdicts, self.report.ensemble_confidence)
    }

    pub fn z_outlier_table(&self) -> Table {
        verdict_table(self.report.z_outliers(), self.report.ensemble_confidence)
    }

    pub fn ensemble_outlier_table(&self) -> Table {
        verdict_table(
            self.report.ensemble_outliers(),
            self.report.ensemble_confidence,
        )
    }
}

/// Terminal state of a run. An input with no timed lines is a normal
/// outcome, not an error.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(AnalysisRun),
    NoValidEntries { lines_seen: usize },
}

impl RunOutcome {
    pub fn completed(self) -> Option<AnalysisRun> {
        match self {
            RunOutcome::Completed(run) => Some(run),
            RunOutcome::NoValidEntries { .. } => None,
        }
    }
}

/// Parse, aggregate and detect, in that order, over one static input set.
pub struct Analyzer {
    aggregator: TimeBucketAggregator,
    detector: AnomalyDetector,
}

impl Analyzer {
    pub fn new(aggregator: TimeBucketAggregator, detector: AnomalyDetector) -> Self {
        Self {
            aggregator,
            detector,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.aggregator()?,
            AnomalyDetector::new(config.detector_config()),
        ))
    }

    pub fn run_sources(&self, sources: &[SourceLines]) -> Result<RunOutcome> {
        let lines_seen: usize = sources.iter().map(|s| s.lines.len()).sum();
        info!("Starting analysis of {} lines from {} sources", lines_seen, sources.len());

        let store = EventStore::from_sources(sources);
        if store.is_empty() {
            warn!("No valid log entries parsed from {} lines", lines_seen);
            return Ok(RunOutcome::NoValidEntries { lines_seen });
        }
        self.run_store(store)
    }

    pub fn run_store(&self, store: EventStore) -> Result<RunOutcome> {
        if store.is_empty() {
            return Ok(RunOutcome::NoValidEntries {
                lines_seen: store.dropped(),
            });
        }

        let buckets = self.aggregator.aggregate(store.events())?;
        let report = self.detector.detect(&buckets);
        info!(
            "Analysis complete: {} events, {} buckets",
            store.len(),
            buckets.len()
        );

        Ok(RunOutcome::Completed(AnalysisRun {
            store,
            buckets,
            report,
        }))
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(TimeBucketAggregator::default(), AnomalyDetector::default())
    }
}
