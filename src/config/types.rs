//! Core configuration types and loading.

use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use thiserror::Error;

use super::abuseipdb::AbuseIpDbConfig;
use super::defaults::{
    default_database_path, default_listen, default_metrics_port, default_purge_interval,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Listener and metrics settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Score cache database.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// AbuseIPDB client settings.
    #[serde(default)]
    pub abuseipdb: AbuseIpDbConfig,
    /// Background maintenance settings.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the gate listens on (default: 127.0.0.1:8080).
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    /// Reverse proxies whose `X-Forwarded-For` / `X-Real-IP` headers are
    /// believed. Empty means the TCP peer is always the client.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            metrics_port: default_metrics_port(),
            trusted_proxies: Vec::new(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Background maintenance configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Seconds between expired-score sweeps (default: 3600).
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            purge_interval_secs: default_purge_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.server.metrics_port, 9090);
        assert!(config.server.trusted_proxies.is_empty());
        assert_eq!(config.database.path, "abusegate.db");
        assert_eq!(config.maintenance.purge_interval_secs, 3600);
        assert!(config.abuseipdb.effective_api_key().is_none());
    }

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r#"
[server]
listen = "0.0.0.0:9000"
metrics_port = 0
trusted_proxies = ["127.0.0.1", "::1"]

[database]
path = ":memory:"

[abuseipdb]
api_key = "secret"
endpoint = "http://127.0.0.1:1/check"
timeout_secs = 3

[maintenance]
purge_interval_secs = 60
"#,
        )
        .unwrap();

        assert_eq!(config.server.listen.port(), 9000);
        assert_eq!(config.server.metrics_port, 0);
        assert_eq!(
            config.server.trusted_proxies,
            vec!["127.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]
        );
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.abuseipdb.effective_api_key().as_deref(), Some("secret"));
        assert_eq!(config.abuseipdb.endpoint, "http://127.0.0.1:1/check");
        assert_eq!(config.abuseipdb.timeout_secs, 3);
        assert_eq!(config.maintenance.purge_interval_secs, 60);
    }

    #[test]
    fn invalid_trusted_proxy_is_a_parse_error() {
        let err = toml::from_str::<Config>("[server]\ntrusted_proxies = [\"not-an-ip\"]");
        assert!(err.is_err());
    }

    #[test]
    fn load_reads_file_and_reports_parse_errors() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        writeln!(good, "[abuseipdb]\napi_key = \"k\"").unwrap();
        let config = Config::load(good.path()).unwrap();
        assert_eq!(config.abuseipdb.api_key.as_deref(), Some("k"));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "[server\nlisten = 1").unwrap();
        assert!(matches!(Config::load(bad.path()), Err(ConfigError::Parse(_))));

        assert!(matches!(
            Config::load("/nonexistent/abusegate.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
