//! Security module for abusegate.
//!
//! Provides the AbuseIPDB-backed ban check:
//! - **AbuseIPDB client**: single-shot score fetch with failure classification
//! - **Ban decider**: cache-aside lookup and the fixed ban threshold
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 BanDecider                   │
//! ├──────────────────┬───────────────────────────┤
//! │   ScoreCache     │   ReputationSource        │
//! │ SQLite, 24h TTL  │ AbuseIPDB v2 /check       │
//! └──────────────────┴───────────────────────────┘
//! ```

pub mod abuseipdb;
pub mod decider;
#[cfg(test)]
pub(crate) mod test_support;

pub use abuseipdb::{AbuseIpDbClient, ReputationSource};
pub use decider::BanDecider;
