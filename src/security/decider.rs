//! Cache-aside ban decision.
//!
//! For each client IP the decider consults the local score cache first and
//! only asks AbuseIPDB on a miss, storing the fetched score for later
//! requests. Every internal failure resolves to "not banned": the gate is
//! supplementary protection and must never take the site down with it.

use crate::config::ApiKeyProvider;
use crate::db::ScoreCache;
use crate::metrics;
use crate::security::ReputationSource;
use crate::telemetry::spans;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{Instrument, debug, warn};

/// Scores strictly above this are banned.
pub const BAN_THRESHOLD: u8 = 50;

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No API key configured; nothing was consulted.
    Disabled,
    /// Score at or below the threshold.
    Allowed { score: u8 },
    /// Score above the threshold.
    Banned { score: u8 },
    /// No score could be obtained; the request is let through.
    FailOpen,
}

impl Decision {
    fn from_score(score: u8) -> Self {
        if score > BAN_THRESHOLD {
            Self::Banned { score }
        } else {
            Self::Allowed { score }
        }
    }

    /// Whether the request must be rejected.
    pub fn is_banned(self) -> bool {
        matches!(self, Self::Banned { .. })
    }

    /// Static label for metrics.
    pub fn label(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Allowed { .. } => "allowed",
            Self::Banned { .. } => "banned",
            Self::FailOpen => "fail_open",
        }
    }
}

/// Orchestrates cache lookups, remote fetches and the ban threshold.
pub struct BanDecider {
    cache: Arc<dyn ScoreCache>,
    source: Arc<dyn ReputationSource>,
    settings: Arc<dyn ApiKeyProvider>,
}

impl BanDecider {
    pub fn new(
        cache: Arc<dyn ScoreCache>,
        source: Arc<dyn ReputationSource>,
        settings: Arc<dyn ApiKeyProvider>,
    ) -> Self {
        Self {
            cache,
            source,
            settings,
        }
    }

    /// Returns `true` if requests from `ip` should be rejected.
    pub async fn is_banned(&self, ip: IpAddr) -> bool {
        self.check(ip).await.is_banned()
    }

    /// Evaluate `ip` against the current time.
    pub async fn check(&self, ip: IpAddr) -> Decision {
        self.check_at(ip, chrono::Utc::now().timestamp()).await
    }

    /// Evaluate `ip` as of `now` (unix seconds).
    pub async fn check_at(&self, ip: IpAddr, now: i64) -> Decision {
        let decision = self.evaluate(ip, now).instrument(spans::check(ip)).await;
        metrics::record_decision(decision.label());
        debug!(ip = %ip, decision = ?decision, "Abuse check complete");
        decision
    }

    async fn evaluate(&self, ip: IpAddr, now: i64) -> Decision {
        // The key check comes before any cache or network access.
        let Some(api_key) = self.settings.api_key() else {
            return Decision::Disabled;
        };

        match self.cache.lookup(ip, now).await {
            Ok(Some(score)) => {
                metrics::record_cache_lookup("hit");
                return Decision::from_score(score);
            }
            Ok(None) => metrics::record_cache_lookup("miss"),
            Err(e) => {
                // Treated as a miss: the remote can still answer.
                metrics::record_cache_lookup("error");
                warn!(ip = %ip, error = %e, "Score cache lookup failed");
            }
        }

        let score = match self.source.fetch_score(ip, &api_key).await {
            Ok(score) => score,
            // Already logged by the client.
            Err(_) => return Decision::FailOpen,
        };

        if let Err(e) = self.cache.store(ip, score, now).await {
            warn!(ip = %ip, score = score, error = %e, "Failed to cache AbuseIPDB score");
        }

        Decision::from_score(score)
    }
}
