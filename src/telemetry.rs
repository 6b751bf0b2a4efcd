//! Telemetry utilities for fetch timing and check spans.

use std::time::Instant;

/// Guard for timing an AbuseIPDB request and recording metrics.
///
/// Records fetch latency when dropped, whatever the outcome.
pub struct FetchTimer {
    start: Instant,
}

impl FetchTimer {
    /// Start timing a fetch.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Drop for FetchTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_fetch_duration(duration);
    }
}

/// Standardized span constructors for gate observability.
pub mod spans {
    use std::net::IpAddr;
    use tracing::{Span, info_span};

    /// Create a span for one abuse check.
    pub fn check(ip: IpAddr) -> Span {
        info_span!("check", ip = %ip)
    }

    /// Create a span for an expiry sweep.
    pub fn purge(now: i64) -> Span {
        info_span!("purge", now = now)
    }
}
