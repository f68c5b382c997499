use crate::aggregate::{TimeBucketAggregator, DEFAULT_BUCKET_WIDTH_SECS, DEFAULT_MAX_BUCKETS};
use crate::detector::{DetectorConfig, ForestParams, DEFAULT_MIN_RELIABLE_BUCKETS};
use crate::error::{Result, SiftError};
use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const PROJECT_CONFIG_FILE: &str = ".logsift.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisSettings,
    pub geo: GeoSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub bucket_width_secs: i64,
    pub max_buckets: u64,
    pub zscore_threshold: f64,
    /// 0 for the population deviation (the default, as `scipy.stats.zscore`
    /// computes it), 1 for the sample deviation.
    pub zscore_ddof: usize,
    pub contamination: f64,
    pub seed: u64,
    pub n_trees: usize,
    pub max_samples: usize,
    pub min_reliable_buckets: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            bucket_width_secs: DEFAULT_BUCKET_WIDTH_SECS,
            max_buckets: DEFAULT_MAX_BUCKETS,
            zscore_threshold: 2.0,
            zscore_ddof: 0,
            contamination: 0.05,
            seed: 42,
            n_trees: 100,
            max_samples: 256,
            min_reliable_buckets: DEFAULT_MIN_RELIABLE_BUCKETS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for GeoSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://ipinfo.io".to_string(),
            timeout_secs: 2,
            cache_ttl_secs: 3600,
            cache_capacity: 4096,
        }
    }
}

impl GeoSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub format: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

impl ExportSettings {
    /// Format used when an export destination is given without a format.
    pub fn output_format(&self) -> Result<OutputFormat> {
        OutputFormat::from_str(&self.format).ok_or_else(|| {
            SiftError::InvalidConfig(format!(
                "export.format '{}' is not one of json, csv, txt",
                self.format
            ))
        })
    }
}

impl Config {
    /// Loads `./.logsift.toml`, then the user config, else defaults.
    pub fn load() -> Result<Self> {
        match Self::get_config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config file found, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Loads one file; keys missing from it keep their default values.
    pub fn load_from(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        if analysis.bucket_width_secs <= 0 {
            return Err(SiftError::InvalidConfig(format!(
                "analysis.bucket_width_secs must be positive, got {}",
                analysis.bucket_width_secs
            )));
        }
        if !(analysis.contamination > 0.0 && analysis.contamination <= 0.5) {
            return Err(SiftError::InvalidConfig(format!(
                "analysis.contamination must be in (0, 0.5], got {}",
                analysis.contamination
            )));
        }
        if analysis.n_trees == 0 || analysis.max_samples == 0 {
            return Err(SiftError::InvalidConfig(
                "analysis.n_trees and analysis.max_samples must be at least 1".to_string(),
            ));
        }
        if analysis.max_buckets == 0 {
            return Err(SiftError::InvalidConfig(
                "analysis.max_buckets must be at least 1".to_string(),
            ));
        }
        if self.geo.cache_capacity == 0 {
            return Err(SiftError::InvalidConfig(
                "geo.cache_capacity must be at least 1".to_string(),
            ));
        }
        self.export.output_format()?;
        Ok(())
    }

    pub fn aggregator(&self) -> Result<TimeBucketAggregator> {
        Ok(TimeBucketAggregator::new(self.analysis.bucket_width_secs)?
            .with_max_buckets(self.analysis.max_buckets))
    }

    pub fn detector_config(&self) -> DetectorConfig {
        let analysis = &self.analysis;
        DetectorConfig {
            zscore_threshold: analysis.zscore_threshold,
            zscore_ddof: analysis.zscore_ddof,
            forest: ForestParams {
                n_trees: analysis.n_trees,
                max_samples: analysis.max_samples,
                contamination: analysis.contamination,
                seed: analysis.seed,
            },
            min_reliable_buckets: analysis.min_reliable_buckets,
        }
    }

    fn get_config_path() -> Option<PathBuf> {
        // Check for project-level config first
        if let Ok(current_dir) = env::current_dir() {
            let project_config = current_dir.join(PROJECT_CONFIG_FILE);
            if project_config.exists() {
                return Some(project_config);
            }
        }

        // Check for user-level config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("logsift").join("config.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.bucket_width_secs, 10);
        assert_eq!(config.analysis.contamination, 0.05);
        assert_eq!(config.analysis.seed, 42);
        assert!(!config.geo.enabled);
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[analysis]\nbucket_width_secs = 60\n\n[geo]\nenabled = true\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.analysis.bucket_width_secs, 60);
        assert_eq!(config.analysis.n_trees, 100);
        assert!(config.geo.enabled);
        assert_eq!(config.geo.timeout_secs, 2);
        assert_eq!(config.export.format, "json");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.analysis.contamination = 0.0;
        assert!(matches!(config.validate(), Err(SiftError::InvalidConfig(_))));

        let mut config = Config::default();
        config.analysis.bucket_width_secs = -5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_export_format_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[export]\nformat = \"CSV\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.export.output_format().unwrap(), OutputFormat::Csv);
        assert_eq!(
            Config::default().export.output_format().unwrap(),
            OutputFormat::Json
        );
    }

    #[test]
    fn test_malformed_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[analysis\nseed = ").unwrap();
        assert!(matches!(Config::load_from(&path), Err(SiftError::Toml(_))));
    }

    #[test]
    fn test_detector_config_mapping() {
        let mut config = Config::default();
        config.analysis.n_trees = 25;
        config.analysis.zscore_ddof = 1;

        let detector = config.detector_config();
        assert_eq!(detector.forest.n_trees, 25);
        assert_eq!(detector.zscore_ddof, 1);
        assert_eq!(detector.forest.seed, 42);
    }
}
