//! Error types for the reputation lookup path.
//!
//! Config and database errors live next to their modules (`config::ConfigError`,
//! `db::DbError`); this module holds the errors raised while talking to
//! AbuseIPDB, with a coarse classification used for logging and metrics.

use thiserror::Error;

/// Coarse failure classes for a score fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The remote rejected the request (4xx).
    ClientRejected,
    /// The remote failed to serve the request (5xx).
    ServerError,
    /// Transport, timeout or decoding failure.
    Unspecified,
}

impl FailureKind {
    /// Label used in metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientRejected => "client_rejected",
            Self::ServerError => "server_error",
            Self::Unspecified => "unspecified",
        }
    }
}

/// Errors that can occur while fetching a score from AbuseIPDB.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("client error {status}: {body}")]
    ClientRejected {
        status: u16,
        /// Parsed error body, or the raw text wrapped as a JSON string.
        body: serde_json::Value,
    },

    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl FetchError {
    /// Map onto the three failure classes the gate distinguishes.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ClientRejected { .. } => FailureKind::ClientRejected,
            Self::ServerError { .. } => FailureKind::ServerError,
            Self::Timeout | Self::Transport(_) | Self::Decode(_) | Self::Unexpected(_) => {
                FailureKind::Unspecified
            }
        }
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ClientRejected { .. } => "client_rejected",
            Self::ServerError { .. } => "server_error",
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::Unexpected(_) => "unexpected",
        }
    }
}
