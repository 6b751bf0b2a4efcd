//! AbuseIPDB client configuration.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{default_abuseipdb_endpoint, default_abuseipdb_timeout};

/// AbuseIPDB configuration.
///
/// An absent or blank `api_key` disables the gate entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct AbuseIpDbConfig {
    /// AbuseIPDB API key (sent in the `Key` header).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Check endpoint (default: the public v2 `check` URL).
    #[serde(default = "default_abuseipdb_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds (default: 10).
    #[serde(default = "default_abuseipdb_timeout")]
    pub timeout_secs: u64,
}

impl Default for AbuseIpDbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_abuseipdb_endpoint(),
            timeout_secs: default_abuseipdb_timeout(),
        }
    }
}

impl AbuseIpDbConfig {
    /// The configured key, with blank values treated as absent.
    pub fn effective_api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    /// Request timeout as a [`Duration`]. Zero is bumped to one second.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
