//! Database module for persistent storage.
//!
//! Provides async SQLite database access using SQLx for the AbuseIPDB
//! score cache (`abuse_ip_db` table).

mod scores;

pub use scores::{FRESHNESS_WINDOW_SECS, ScoreRepository};

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("integrity check failed: {0}")]
    Integrity(String),
}

/// Storage seam used by the ban decider.
///
/// `lookup` must never return a score older than the freshness window.
#[async_trait]
pub trait ScoreCache: Send + Sync {
    /// Most recent fresh score for `ip` as of `now`, if any.
    async fn lookup(&self, ip: IpAddr, now: i64) -> Result<Option<u8>, DbError>;

    /// Record a score observed at `observed_at`.
    async fn store(&self, ip: IpAddr, score: u8, observed_at: i64) -> Result<(), DbError>;

    /// Delete every record that is no longer fresh as of `now`.
    async fn purge_expired(&self, now: i64) -> Result<u64, DbError>;
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new database connection, running migrations if needed.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // `file::memory:` is shared process-wide and collides across
            // parallel tests, so every handle gets its own named database.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:abusegate-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            // The database lives only as long as a connection is open, so
            // the single connection is pinned for the life of the pool.
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(None)
                .max_lifetime(None)
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        // WAL lets lookups proceed while a store or purge is writing.
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;

        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(DbError::Integrity(integrity_result));
        }

        info!("Database integrity check passed");

        Ok(Self { pool })
    }

    /// Run embedded migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(DbError::Migration)?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Get score repository.
    pub fn scores(&self) -> ScoreRepository<'_> {
        ScoreRepository::new(&self.pool)
    }
}

#[async_trait]
impl ScoreCache for Database {
    async fn lookup(&self, ip: IpAddr, now: i64) -> Result<Option<u8>, DbError> {
        let record = self.scores().lookup(&ip.to_string(), now).await?;
        if let Some(ref r) = record {
            tracing::trace!(ip = %r.ip, age_secs = now - r.observed_at, "Fresh cached score found");
        }
        Ok(record.map(|r| r.score))
    }

    async fn store(&self, ip: IpAddr, score: u8, observed_at: i64) -> Result<(), DbError> {
        self.scores().store(&ip.to_string(), score, observed_at).await
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, DbError> {
        self.scores().purge_expired(now).await
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}
