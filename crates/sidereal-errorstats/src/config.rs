//! Configuration types for the error statistics engine.

use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::StatsError;

/// Separator placed between the rendered parts of a fingerprint.
pub const DEFAULT_SEPARATOR: &str = "/ ";

/// Default interval between periodic reports in seconds.
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 60;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "errorstats.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ERRORSTATS_";

/// Error statistics configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatsConfig {
    /// Separator joining visited parts (default: `"/ "`).
    pub separator: String,
    /// Interval for [`start_periodic_report`](crate::start_periodic_report).
    pub report_interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_owned(),
            report_interval_secs: DEFAULT_REPORT_INTERVAL_SECS,
        }
    }
}

impl StatsConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order (later sources override earlier):
    /// 1. Default values
    /// 2. `errorstats.toml` in current directory
    /// 3. Environment variables prefixed with `ERRORSTATS_`
    pub fn load() -> Result<Self, StatsError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &str) -> Result<Self, StatsError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| StatsError::Config(e.to_string()))
    }

    /// Report interval as a [`Duration`].
    #[must_use]
    pub const fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config() {
        let config = StatsConfig::default();
        assert_eq!(config.separator, DEFAULT_SEPARATOR);
        assert_eq!(config.report_interval_secs, DEFAULT_REPORT_INTERVAL_SECS);
        assert_eq!(config.report_interval(), Duration::from_secs(60));
    }

    #[test]
    fn load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
        writeln!(file, "separator = \" | \"").unwrap();
        writeln!(file, "report_interval_secs = 5").unwrap();

        let config = StatsConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.separator, " | ");
        assert_eq!(config.report_interval_secs, 5);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = StatsConfig::load_from("/nonexistent/errorstats.toml").unwrap();
        assert_eq!(config.separator, DEFAULT_SEPARATOR);
    }

    #[test]
    fn invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
        writeln!(file, "report_interval_secs = \"soon\"").unwrap();

        let result = StatsConfig::load_from(file.path().to_str().unwrap());
        assert!(matches!(result, Err(StatsError::Config(_))));
    }
}
