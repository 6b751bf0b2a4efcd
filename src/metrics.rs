//! Prometheus metrics collection for abusegate.
//!
//! Exposed on the metrics HTTP endpoint (see [`crate::http`]):
//!
//! - `abusegate_decisions_total{decision}` - Checks by outcome
//! - `abusegate_cache_lookups_total{result}` - Score cache hits, misses and errors
//! - `abusegate_fetch_failures_total{kind}` - AbuseIPDB failures by class
//! - `abusegate_fetch_duration_seconds` - AbuseIPDB request latency
//! - `abusegate_purged_records_total` - Expired scores removed by the sweep
//!
//! Recording is a no-op until [`init`] has run, so unit tests never need it.

use crate::error::FailureKind;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Checks by decision (allowed, banned, disabled, fail_open).
pub static DECISIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Score cache lookups by result (hit, miss, error).
pub static CACHE_LOOKUPS: OnceLock<IntCounterVec> = OnceLock::new();

/// AbuseIPDB failures by kind.
pub static FETCH_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Expired score records deleted.
pub static PURGED_RECORDS: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// AbuseIPDB request latency.
pub static FETCH_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(DECISIONS, IntCounterVec::new(Opts::new("abusegate_decisions_total", "Abuse checks by decision"), &["decision"]));
    register!(CACHE_LOOKUPS, IntCounterVec::new(Opts::new("abusegate_cache_lookups_total", "Score cache lookups by result"), &["result"]));
    register!(FETCH_FAILURES, IntCounterVec::new(Opts::new("abusegate_fetch_failures_total", "AbuseIPDB fetch failures by kind"), &["kind"]));
    register!(PURGED_RECORDS, IntCounter::new("abusegate_purged_records_total", "Expired score records removed"));
    register!(FETCH_DURATION, Histogram::with_opts(
        HistogramOpts::new("abusegate_fetch_duration_seconds", "AbuseIPDB request latency")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

/// Record the outcome of a check.
#[inline]
pub fn record_decision(decision: &str) {
    if let Some(c) = DECISIONS.get() {
        c.with_label_values(&[decision]).inc();
    }
}

/// Record a score cache lookup result.
#[inline]
pub fn record_cache_lookup(result: &str) {
    if let Some(c) = CACHE_LOOKUPS.get() {
        c.with_label_values(&[result]).inc();
    }
}

/// Record a failed AbuseIPDB fetch.
#[inline]
pub fn record_fetch_failure(kind: FailureKind) {
    if let Some(c) = FETCH_FAILURES.get() {
        c.with_label_values(&[kind.as_str()]).inc();
    }
}

/// Record AbuseIPDB request latency.
#[inline]
pub fn record_fetch_duration(duration_secs: f64) {
    if let Some(h) = FETCH_DURATION.get() {
        h.observe(duration_secs);
    }
}

/// Record rows removed by an expiry sweep.
#[inline]
pub fn record_purged(count: u64) {
    if let Some(c) = PURGED_RECORDS.get() {
        c.inc_by(count);
    }
}
