//! In-memory doubles for the decider's collaborators.

use crate::db::{DbError, FRESHNESS_WINDOW_SECS, ScoreCache};
use crate::error::FetchError;
use crate::security::ReputationSource;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Score cache kept in a vector, with call counting.
#[derive(Default)]
pub(crate) struct MemoryCache {
    rows: Mutex<Vec<(IpAddr, u8, i64)>>,
    lookups: AtomicUsize,
    failing: bool,
}

impl MemoryCache {
    /// A cache whose every operation errors.
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub(crate) fn insert(&self, ip: IpAddr, score: u8, observed_at: i64) {
        self.rows.lock().push((ip, score, observed_at));
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self) -> usize {
        self.rows.lock().len()
    }

    /// Newest `(score, observed_at)` for `ip`, ignoring freshness.
    pub(crate) fn latest(&self, ip: IpAddr) -> Option<(u8, i64)> {
        self.rows
            .lock()
            .iter()
            .filter(|(row_ip, _, _)| *row_ip == ip)
            .max_by_key(|(_, _, at)| *at)
            .map(|(_, score, at)| (*score, *at))
    }

    fn check_failing(&self) -> Result<(), DbError> {
        if self.failing {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreCache for MemoryCache {
    async fn lookup(&self, ip: IpAddr, now: i64) -> Result<Option<u8>, DbError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let cutoff = now - FRESHNESS_WINDOW_SECS;
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|(row_ip, _, at)| *row_ip == ip && *at > cutoff)
            .max_by_key(|(_, _, at)| *at)
            .map(|(_, score, _)| *score))
    }

    async fn store(&self, ip: IpAddr, score: u8, observed_at: i64) -> Result<(), DbError> {
        self.check_failing()?;
        self.insert(ip, score, observed_at);
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, DbError> {
        self.check_failing()?;
        let cutoff = now - FRESHNESS_WINDOW_SECS;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|(_, _, at)| *at > cutoff);
        Ok((before - rows.len()) as u64)
    }
}

enum StubReply {
    Score(u8),
    ClientRejected,
    ServerError,
    Timeout,
}

/// Reputation source with a canned reply.
pub(crate) struct StubSource {
    reply: StubReply,
    calls: AtomicUsize,
    last_key: Mutex<Option<String>>,
}

impl StubSource {
    fn new(reply: StubReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last_key: Mutex::new(None),
        }
    }

    pub(crate) fn score(score: u8) -> Self {
        Self::new(StubReply::Score(score))
    }

    pub(crate) fn client_rejected() -> Self {
        Self::new(StubReply::ClientRejected)
    }

    pub(crate) fn server_error() -> Self {
        Self::new(StubReply::ServerError)
    }

    pub(crate) fn timeout() -> Self {
        Self::new(StubReply::Timeout)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_key(&self) -> Option<String> {
        self.last_key.lock().clone()
    }
}

#[async_trait]
impl ReputationSource for StubSource {
    async fn fetch_score(&self, _ip: IpAddr, api_key: &str) -> Result<u8, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_key.lock() = Some(api_key.to_string());
        match self.reply {
            StubReply::Score(score) => Ok(score),
            StubReply::ClientRejected => Err(FetchError::ClientRejected {
                status: 401,
                body: serde_json::json!({"errors": [{"detail": "Authentication failed"}]}),
            }),
            StubReply::ServerError => Err(FetchError::ServerError {
                status: 503,
                body: "Service Unavailable".to_string(),
            }),
            StubReply::Timeout => Err(FetchError::Timeout),
        }
    }
}
