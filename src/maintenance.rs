//! Expired score sweep.
//!
//! Deletes cached scores that have fallen out of the freshness window. Runs
//! once at startup and then on a fixed interval, independent of request
//! handling.

use crate::db::ScoreCache;
use crate::metrics;
use crate::telemetry::spans;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, info, warn};

/// Run one sweep as of `now`. Errors are logged and reported as zero rows.
pub async fn purge_once(cache: &dyn ScoreCache, now: i64) -> u64 {
    async {
        match cache.purge_expired(now).await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed = removed, "Expired AbuseIPDB scores purged");
                }
                metrics::record_purged(removed);
                removed
            }
            Err(e) => {
                warn!(error = %e, "Failed to purge expired AbuseIPDB scores");
                0
            }
        }
    }
    .instrument(spans::purge(now))
    .await
}

/// Spawn the periodic purge task.
///
/// The first tick fires immediately, so expired rows left by a previous run
/// are cleared at startup.
pub fn spawn_purge_task(cache: Arc<dyn ScoreCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            purge_once(cache.as_ref(), chrono::Utc::now().timestamp()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, FRESHNESS_WINDOW_SECS};
    use crate::security::test_support::MemoryCache;

    const NOW: i64 = 1_760_000_000;
    const HOUR: i64 = 60 * 60;

    #[tokio::test]
    async fn purge_once_removes_expired_rows() {
        let db = Database::new(":memory:").await.unwrap();
        db.scores().store("10.1.1.1", 60, NOW - 25 * HOUR).await.unwrap();
        db.scores().store("10.1.1.2", 60, NOW - HOUR).await.unwrap();

        assert_eq!(purge_once(&db, NOW).await, 1);
        assert_eq!(db.scores().count_for("10.1.1.1").await.unwrap(), 0);
        assert_eq!(db.scores().count_for("10.1.1.2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn purge_once_swallows_errors() {
        let cache = MemoryCache::failing();
        assert_eq!(purge_once(&cache, NOW).await, 0);
    }

    #[tokio::test]
    async fn purge_task_runs_immediately() {
        let cache = Arc::new(MemoryCache::default());
        let now = chrono::Utc::now().timestamp();
        cache.insert("10.2.2.2".parse().unwrap(), 90, now - FRESHNESS_WINDOW_SECS - 60);
        cache.insert("10.2.2.3".parse().unwrap(), 90, now - 60);

        let handle = spawn_purge_task(cache.clone(), Duration::from_secs(3600));
        for _ in 0..50 {
            if cache.stored() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(cache.stored(), 1);
    }
}
