//! Error types shared across the engine and its collaborators.
//!
//! Generator errors are defined here so the background loader can classify
//! them for retry decisions without string matching.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fatal at `start()`; the session is never created.
    #[error("invalid exam config: {0}")]
    InvalidConfig(String),

    /// Answer writes outside the fixed slot array are rejected, never
    /// silently clamped.
    #[error("slot index {slot} out of range (total slots: {total})")]
    SlotOutOfRange { slot: usize, total: usize },

    #[error("session is not running (status: {status})")]
    NotRunning { status: String },

    #[error("session already finished")]
    AlreadyFinished,

    #[error("session cancelled")]
    Cancelled,

    #[error("no such session: {0}")]
    SessionNotFound(Uuid),

    #[error("batch queue is empty")]
    QueueEmpty,

    /// The generator returned a different number of questions than the
    /// head request asked for. The request stays queued for a retry.
    #[error("batch returned {got} questions, expected {expected}")]
    BatchMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

/// Errors from the AI content generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The generator answered with something the engine cannot use.
    #[error("malformed generator response: {0}")]
    InvalidResponse(String),
}

impl GeneratorError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(self, GeneratorError::AuthenticationFailed(_))
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            GeneratorError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Errors from the session store. Recoverable: the in-memory session keeps
/// running when a save fails.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_is_permanent() {
        assert!(GeneratorError::AuthenticationFailed("bad key".into()).is_permanent());
        assert!(!GeneratorError::Network("reset".into()).is_permanent());
        assert!(!GeneratorError::RateLimited {
            retry_after_ms: 500
        }
        .is_permanent());
    }

    #[test]
    fn rate_limit_carries_retry_hint() {
        let err = GeneratorError::RateLimited {
            retry_after_ms: 2500,
        };
        assert_eq!(err.retry_after_ms(), Some(2500));
        assert_eq!(GeneratorError::Timeout(30).retry_after_ms(), None);
    }
}
