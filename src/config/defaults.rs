//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

pub fn default_metrics_port() -> u16 {
    9090
}

pub fn default_database_path() -> String {
    "abusegate.db".to_string()
}

// =============================================================================
// AbuseIPDB Defaults
// =============================================================================

pub fn default_abuseipdb_endpoint() -> String {
    "https://api.abuseipdb.com/api/v2/check".to_string()
}

pub fn default_abuseipdb_timeout() -> u64 {
    10
}

// =============================================================================
// Maintenance Defaults
// =============================================================================

pub fn default_purge_interval() -> u64 {
    3600 // hourly, like a cron run
}
