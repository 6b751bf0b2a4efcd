//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config struct definitions (Config, ServerConfig, DatabaseConfig)
//! - [`abuseipdb`]: AbuseIPDB client configuration (API key, endpoint, timeout)
//! - [`settings`]: Live, reloadable settings handed to the ban decider
//! - [`defaults`]: Serde default value functions

mod abuseipdb;
mod defaults;
mod settings;
mod types;

pub use abuseipdb::AbuseIpDbConfig;
pub use settings::{ApiKeyProvider, Settings};
pub use types::Config;
