//! Configuration for the feature pipeline and the query service.
//!
//! [`CdfConfig`] is read from `~/.cdf/config.toml` (or an explicit path) and
//! supports partial files: every unspecified value falls back to its default.
//!
//! ```toml
//! [pipeline]
//! lags = [1, 3, 7]
//! windows = [7, 30]
//! fill_scope = "table"
//!
//! [query]
//! cache_ttl_secs = 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CdfError, CdfResult};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CdfConfig {
    /// Feature engineering settings.
    pub pipeline: PipelineConfig,

    /// Aggregation query service settings.
    pub query: QueryConfig,
}

/// Which rows the missing-value reconciler may borrow values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FillScope {
    /// Fill across the whole table in row order. Values can leak between
    /// neighbouring series.
    #[default]
    Table,
    /// Fill only within each series, in chronological order.
    Partition,
}

/// Feature engineering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lag offsets applied to `usage_cpu`, in series-local steps.
    pub lags: Vec<usize>,

    /// Trailing rolling window sizes, in series-local steps.
    pub windows: Vec<usize>,

    /// Scope of the backward/forward fill.
    pub fill_scope: FillScope,

    /// Worker threads for per-series computation (0 = auto-detect).
    pub threads: usize,

    /// Seeded exogenous columns.
    pub synthetic: SyntheticConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 3, 7],
            windows: vec![7, 30],
            fill_scope: FillScope::Table,
            threads: 0,
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> CdfResult<()> {
        if self.lags.iter().any(|&k| k == 0) {
            return Err(CdfError::Config("lag offsets must be at least 1".into()));
        }
        if self.windows.iter().any(|&w| w == 0) {
            return Err(CdfError::Config("rolling windows must be at least 1".into()));
        }
        if has_duplicates(&self.lags) || has_duplicates(&self.windows) {
            return Err(CdfError::Config(
                "lag offsets and rolling windows must be unique".into(),
            ));
        }
        Ok(())
    }
}

fn has_duplicates(values: &[usize]) -> bool {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).any(|pair| pair[0] == pair[1])
}

/// Seeded exogenous columns (weather index, outage flag, price change).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub enabled: bool,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: 42,
        }
    }
}

/// Aggregation query service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Result cache time-to-live in seconds (0 disables caching).
    pub cache_ttl_secs: u64,

    /// Maximum number of cached results.
    pub cache_capacity: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            cache_capacity: 1024,
        }
    }
}

impl QueryConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> CdfResult<()> {
        if self.cache_capacity == 0 {
            return Err(CdfError::Config("cache_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

impl CdfConfig {
    /// Get the default config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".cdf"))
    }

    /// Get the default config file path.
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load configuration from the default location.
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load() -> CdfResult<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> CdfResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> CdfResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> CdfResult<()> {
        self.pipeline.validate()?;
        self.query.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let config = CdfConfig::default();
        assert_eq!(config.pipeline.lags, vec![1, 3, 7]);
        assert_eq!(config.pipeline.windows, vec![7, 30]);
        assert_eq!(config.pipeline.fill_scope, FillScope::Table);
        assert_eq!(config.query.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn partial_file_uses_defaults() {
        let config: CdfConfig = toml::from_str(
            r#"
            [pipeline]
            windows = [3]
            fill_scope = "partition"
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.windows, vec![3]);
        assert_eq!(config.pipeline.lags, vec![1, 3, 7]);
        assert_eq!(config.pipeline.fill_scope, FillScope::Partition);
        assert_eq!(config.query.cache_capacity, 1024);
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut config = CdfConfig::default();
        config.pipeline.windows = vec![0];
        assert!(matches!(config.validate(), Err(CdfError::Config(_))));
    }

    #[test]
    fn duplicate_lags_are_rejected() {
        let mut config = CdfConfig::default();
        config.pipeline.lags = vec![1, 1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = CdfConfig::default();
        config.query.cache_ttl_secs = 60;
        config.save_to(&path).unwrap();
        let loaded = CdfConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
