//! Configuration module
//!
//! Handles loading and layering the suite run configuration.

mod env;

pub use env::{EnvBuilder, EnvConfig, EnvGuard};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run configuration consumed by [`Suite::run`](crate::suite::Suite::run)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Seed for top-level and full randomization
    pub random_seed: u64,

    /// Permute every spec, not only the top-level groups
    pub randomize_all_specs: bool,

    /// Only run specs whose text matches this regex
    pub focus_string: Option<String>,

    /// Skip specs whose text matches this regex
    pub skip_string: Option<String>,

    /// File listing the full texts of the specs to run
    pub include_file: Option<PathBuf>,

    /// Treat pending specs as failures
    pub fail_on_pending: bool,

    /// Abort remaining specs after the first failure
    pub fail_fast: bool,

    /// Report every spec as passed without running anything
    pub dry_run: bool,

    /// Abort remaining specs once the suite has run this long
    pub suite_timeout_ms: Option<u64>,

    /// Timeout for async nodes registered without one
    pub spec_timeout_ms: u64,

    /// Attempts per failing spec before it is reported failed
    pub flake_attempts: u32,

    /// Match focus/skip patterns against the source file too
    pub regex_scans_file_path: bool,

    /// Write a progress line into the capture buffer before each node
    pub emit_spec_progress: bool,

    /// Skip all measure specs
    pub skip_measurements: bool,

    /// Write spec output straight to stdout instead of buffering it
    pub stream_output: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            random_seed: chrono::Utc::now().timestamp().unsigned_abs(),
            randomize_all_specs: false,
            focus_string: None,
            skip_string: None,
            include_file: None,
            fail_on_pending: false,
            fail_fast: false,
            dry_run: false,
            suite_timeout_ms: None,
            spec_timeout_ms: 1000,
            flake_attempts: 1,
            regex_scans_file_path: false,
            emit_spec_progress: false,
            skip_measurements: false,
            stream_output: false,
        }
    }
}

impl SuiteConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Self = if is_yaml(path.as_ref()) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = if is_yaml(path.as_ref()) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn suite_timeout(&self) -> Option<Duration> {
        self.suite_timeout_ms.map(Duration::from_millis)
    }

    pub fn spec_timeout(&self) -> Duration {
        Duration::from_millis(self.spec_timeout_ms)
    }

    /// Effective attempts per spec (never less than one)
    pub fn max_attempts(&self) -> u32 {
        self.flake_attempts.max(1)
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SuiteConfig::default();
        assert_eq!(config.spec_timeout(), Duration::from_secs(1));
        assert_eq!(config.suite_timeout(), None);
        assert_eq!(config.max_attempts(), 1);
        assert!(!config.fail_fast);
        assert!(config.random_seed > 0);
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        let config = SuiteConfig {
            focus_string: Some("Cache".to_string()),
            suite_timeout_ms: Some(2500),
            fail_fast: true,
            ..SuiteConfig::default()
        }
        .with_seed(17);

        config.save(&path).unwrap();
        let loaded = SuiteConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.suite_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.json");
        std::fs::write(&path, r#"{"random_seed": 3, "dry_run": true}"#).unwrap();

        let loaded = SuiteConfig::load(&path).unwrap();
        assert_eq!(loaded.random_seed, 3);
        assert!(loaded.dry_run);
        assert_eq!(loaded.spec_timeout_ms, 1000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SuiteConfig::load("/no/such/suite.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
