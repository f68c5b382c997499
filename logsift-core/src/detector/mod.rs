pub mod isolation_forest;
pub mod zscore;

pub use isolation_forest::{ForestParams, IsolationForest};
pub use zscore::{zscores, ZScores};

use crate::aggregate::Bucket;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Below this many buckets the ensemble judgments are reported as low confidence.
pub const DEFAULT_MIN_RELIABLE_BUCKETS: usize = 5;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// A bucket is a z-score outlier when `|z|` exceeds this.
    pub zscore_threshold: f64,
    /// Delta degrees of freedom for the standard deviation.
    pub zscore_ddof: usize,
    pub forest: ForestParams,
    pub min_reliable_buckets: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            zscore_threshold: 2.0,
            zscore_ddof: 0,
            forest: ForestParams::default(),
            min_reliable_buckets: DEFAULT_MIN_RELIABLE_BUCKETS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnsembleConfidence {
    Normal,
    /// Too few buckets to train on; labels are still reported but should not
    /// be trusted on their own.
    Low,
}

impl EnsembleConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnsembleConfidence::Normal => "normal",
            EnsembleConfidence::Low => "low",
        }
    }
}

/// Both judgments for one bucket. They are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    pub window_start: i64,
    pub count: u64,
    pub zscore: f64,
    pub is_outlier_z: bool,
    pub ensemble_score: f64,
    pub is_outlier_ensemble: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub verdicts: Vec<AnomalyVerdict>,
    pub mean: f64,
    pub std_dev: f64,
    pub ensemble_threshold: f64,
    pub ensemble_confidence: EnsembleConfidence,
}

impl AnomalyReport {
    pub fn z_outliers(&self) -> impl Iterator<Item = &AnomalyVerdict> {
        self.verdicts.iter().filter(|v| v.is_outlier_z)
    }

    pub fn ensemble_outliers(&self) -> impl Iterator<Item = &AnomalyVerdict> {
        self.verdicts.iter().filter(|v| v.is_outlier_ensemble)
    }

    /// Buckets where exactly one of the two methods fired.
    pub fn disagreements(&self) -> impl Iterator<Item = &AnomalyVerdict> {
        self.verdicts
            .iter()
            .filter(|v| v.is_outlier_z != v.is_outlier_ensemble)
    }
}

pub struct AnomalyDetector {
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Runs the z-score and isolation-forest judgments over the full bucket
    /// sequence.
    pub fn detect(&self, buckets: &[Bucket]) -> AnomalyReport {
        let counts: Vec<f64> = buckets.iter().map(|b| b.count as f64).collect();

        let z = zscores(&counts, self.config.zscore_ddof);
        if z.is_degenerate() {
            debug!("Bucket counts have zero spread, z-scores pinned to 0");
        }

        let ensemble_confidence = if buckets.len() < self.config.min_reliable_buckets {
            warn!(
                "Only {} buckets; isolation forest labels are low confidence",
                buckets.len()
            );
            EnsembleConfidence::Low
        } else {
            EnsembleConfidence::Normal
        };

        let forest = IsolationForest::fit(&counts, &self.config.forest);
        let ensemble_scores = match &forest {
            Some(forest) => forest.score_samples(&counts),
            None => Vec::new(),
        };
        let ensemble_threshold = forest.as_ref().map(|f| f.threshold()).unwrap_or(0.0);

        let verdicts: Vec<AnomalyVerdict> = buckets
            .iter()
            .zip(z.scores.iter())
            .zip(ensemble_scores.iter())
            .map(|((bucket, zscore), score)| AnomalyVerdict {
                window_start: bucket.window_start,
                count: bucket.count,
                zscore: *zscore,
                is_outlier_z: zscore.abs() > self.config.zscore_threshold,
                ensemble_score: *score,
                is_outlier_ensemble: forest.as_ref().is_some_and(|f| f.is_outlier(*score)),
            })
            .collect();

        let report = AnomalyReport {
            verdicts,
            mean: z.mean,
            std_dev: z.std_dev,
            ensemble_threshold,
            ensemble_confidence,
        };
        info!(
            "Detected {} z-score and {} ensemble outliers across {} buckets",
            report.z_outliers().count(),
            report.ensemble_outliers().count(),
            buckets.len()
        );
        report
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
