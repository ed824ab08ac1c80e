//! Configuration for the catalog build
//!
//! Defaults are overridden from environment variables, or the whole structure
//! can be read from a YAML file.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{CatalogError, CatalogResult};

/// Catalog build configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Archive paths (`.zip`/`.jar`) or directories holding descriptors
    #[serde(default)]
    pub sources: Vec<String>,

    /// Maximum number of descriptor parse units in flight
    #[serde(default = "default_parse_concurrency")]
    pub parse_concurrency: usize,

    /// How long callers wait for catalog readiness
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Directory names that are never descended into
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
}

fn default_parse_concurrency() -> usize {
    16
}

fn default_ready_timeout_secs() -> u64 {
    60
}

fn default_excluded_dirs() -> Vec<String> {
    [".git", ".github", "docs", "library", "script", "templates", "test"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            parse_concurrency: default_parse_concurrency(),
            ready_timeout_secs: default_ready_timeout_secs(),
            excluded_dirs: default_excluded_dirs(),
        }
    }
}

impl CatalogConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Ok(sources) = env::var("CONDUIT_CATALOG_SOURCES") {
            config.sources = split_list(&sources);
        }

        if let Ok(concurrency) = env::var("CONDUIT_PARSE_CONCURRENCY") {
            match concurrency.parse::<usize>() {
                Ok(n) if n > 0 => config.parse_concurrency = n,
                _ => warn!("Invalid CONDUIT_PARSE_CONCURRENCY value: {}", concurrency),
            }
        }

        if let Ok(timeout) = env::var("CONDUIT_READY_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse::<u64>() {
                config.ready_timeout_secs = secs;
            } else {
                warn!("Invalid CONDUIT_READY_TIMEOUT_SECS value: {}", timeout);
            }
        }

        if let Ok(excluded) = env::var("CONDUIT_EXCLUDED_DIRS") {
            config.excluded_dirs = split_list(&excluded);
        }

        info!(
            sources = config.sources.len(),
            parse_concurrency = config.parse_concurrency,
            "Catalog configuration loaded"
        );

        config
    }

    /// Read the configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> CatalogResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CatalogConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CatalogResult<()> {
        if self.parse_concurrency == 0 {
            return Err(CatalogError::Config(
                "parse_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.parse_concurrency, 16);
        assert_eq!(config.ready_timeout(), Duration::from_secs(60));
        assert!(config.excluded_dirs.contains(&"templates".to_string()));
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_from_yaml_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sources:\n  - /opt/catalog/camel.zip\n  - /opt/kamelets\nparse_concurrency: 4").unwrap();

        let config = CatalogConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.sources, vec!["/opt/catalog/camel.zip", "/opt/kamelets"]);
        assert_eq!(config.parse_concurrency, 4);
        assert_eq!(config.ready_timeout_secs, 60);
        assert_eq!(config.excluded_dirs, default_excluded_dirs());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "parse_concurrency: 0").unwrap();

        let err = CatalogConfig::from_yaml_file(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "ERR_CATALOG_CONFIG");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a.zip, ,b "), vec!["a.zip", "b"]);
    }
}
