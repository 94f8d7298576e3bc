//! Service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use arban_types::TrustParams;

use crate::logging::LogFormat;
use crate::ServiceError;

/// Configuration for a trust service.
///
/// Can be loaded from a TOML file via [`ServiceConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding the LMDB trust store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Base URL of the distribution service. Without it, level transitions
    /// are not forwarded anywhere.
    #[serde(default)]
    pub distribution_endpoint: Option<String>,

    /// Whether to dump Prometheus metrics after each command.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Trust-graph parameters.
    #[serde(default)]
    pub params: TrustParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./arban_data")
}

fn default_map_size() -> usize {
    arban_store_lmdb::environment::DEFAULT_MAP_SIZE
}

fn default_log_format() -> LogFormat {
    LogFormat::Human
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, ServiceError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ServiceError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string and check the parameters.
    pub fn from_toml_str(s: &str) -> Result<Self, ServiceError> {
        let config: Self = toml::from_str(s).map_err(|e| ServiceError::Config(e.to_string()))?;
        config.params.validate().map_err(ServiceError::Config)?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ServiceError> {
        toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            distribution_endpoint: None,
            enable_metrics: false,
            params: TrustParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = ServiceConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = ServiceConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.map_size, config.map_size);
        assert_eq!(parsed.params, config.params);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = ServiceConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.params.group_size, 5);
        assert_eq!(config.params.cascade_depth_limit, 10);
        assert!(config.distribution_endpoint.is_none());
    }

    #[test]
    fn partial_params_override() {
        let toml = r#"
            log_format = "json"
            distribution_endpoint = "http://localhost:8080"

            [params]
            cascade_depth_limit = 4
        "#;
        let config = ServiceConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.params.cascade_depth_limit, 4);
        assert_eq!(config.params.group_emission_limit, 1000);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let err = ServiceConfig::from_toml_str("[params]\ngroup_size = 1\n").unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = ServiceConfig::from_toml_file("/nonexistent/arban.toml");
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }
}
