//! Repository for cached AbuseIPDB scores.

use super::DbError;
use sqlx::SqlitePool;

/// How long a cached score is trusted without asking AbuseIPDB again.
pub const FRESHNESS_WINDOW_SECS: i64 = 24 * 60 * 60;

/// A cached confidence score for one IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRecord {
    pub ip: String,
    pub score: u8,
    pub observed_at: i64,
}

/// Oldest timestamp that is still considered stale as of `now`.
///
/// Records strictly newer than this are fresh.
fn expiry_cutoff(now: i64) -> i64 {
    now - FRESHNESS_WINDOW_SECS
}

/// Repository for score cache operations.
pub struct ScoreRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ScoreRepository<'a> {
    /// Create a new score repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent fresh record for `ip`, or `None` if it was never seen or
    /// only stale rows remain. Rows whose score is outside 0-100 are skipped
    /// rather than coerced.
    pub async fn lookup(&self, ip: &str, now: i64) -> Result<Option<ScoreRecord>, DbError> {
        let row = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT ip, score, timestamp
            FROM abuse_ip_db
            WHERE ip = ? AND timestamp > ? AND score BETWEEN 0 AND 100
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(ip)
        .bind(expiry_cutoff(now))
        .fetch_optional(self.pool)
        .await?;

        Ok(row.and_then(|(ip, score, observed_at)| {
            Some(ScoreRecord {
                ip,
                score: u8::try_from(score).ok()?,
                observed_at,
            })
        }))
    }

    /// Insert a new record. Earlier rows for the same IP are left in place.
    pub async fn store(&self, ip: &str, score: u8, observed_at: i64) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO abuse_ip_db (ip, score, timestamp)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(ip)
        .bind(i64::from(score))
        .bind(observed_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete all records that are no longer fresh as of `now`.
    ///
    /// Returns the number of rows removed.
    pub async fn purge_expired(&self, now: i64) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM abuse_ip_db WHERE timestamp <= ?")
            .bind(expiry_cutoff(now))
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Number of rows held for `ip`, fresh or not.
    #[cfg(test)]
    pub async fn count_for(&self, ip: &str) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM abuse_ip_db WHERE ip = ?")
            .bind(ip)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
