//! Logging setup for the Conduit crates.
//!
//! Libraries only emit `tracing` events; binaries call [`init_logging`] once
//! with a [`LoggingConfig`] to install the subscriber.

use serde::{Deserialize, Serialize};
use std::env;

pub mod logging;

pub use logging::{init_logging, LogExt};

/// Configuration for the logging subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// `EnvFilter` directives (e.g. "info,conduit_binding=debug")
    pub log_filter: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "conduit".to_string(),
            log_filter: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    /// Apply the `LOG_FILTER` and `LOG_FORMAT` environment variables
    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self::new(service_name).with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides read through `lookup`. `LOG_FORMAT` accepts `json` or
    /// `pretty`; other values leave the format unchanged.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(filter) = lookup("LOG_FILTER").filter(|f| !f.trim().is_empty()) {
            self.log_filter = filter;
        }
        match lookup("LOG_FORMAT").map(|f| f.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => self.json = true,
            Some("pretty") => self.json = false,
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.service_name, "conduit");
        assert_eq!(config.log_filter, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> =
            [("LOG_FILTER", "debug,walkdir=warn"), ("LOG_FORMAT", "JSON")].into_iter().collect();
        let config = LoggingConfig::new("conduit-resolve")
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(
            config,
            LoggingConfig {
                service_name: "conduit-resolve".to_string(),
                log_filter: "debug,walkdir=warn".to_string(),
                json: true,
            }
        );
    }

    #[test]
    fn test_unknown_format_is_ignored() {
        let config = LoggingConfig::default().with_overrides(|key| match key {
            "LOG_FORMAT" => Some("xml".to_string()),
            "LOG_FILTER" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config, LoggingConfig::default());
    }
}
