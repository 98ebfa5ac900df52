//! Error types for the short number pool.
//!
//! The central [`Error`] enum captures every outcome a caller of the pool can
//! observe. Three of them carry the weight of the allocation contract:
//!
//! - [`Error::Exhausted`]: the pool has no unlocked record right now. This is
//!   an expected, recoverable outcome, not a bug.
//! - [`Error::Store`]: the persistence layer failed (I/O, SQL, timeout).
//! - [`Error::Conflict`]: a consumed short number was re-marked under a
//!   different owner. This is a caller-side defect and must not be retried.

use core::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for allocation, usage recording, and replenishment.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// No unlocked short number is available for allocation.
    #[error("No short number available for allocation")]
    Exhausted,

    /// The underlying store failed to complete the operation.
    #[error("Store error: {context}")]
    Store { context: String },

    /// The short number was already consumed by a different owner.
    #[error("Short number {value} already used by {existing:?}, refusing {requested:?}")]
    Conflict {
        value: String,
        existing: String,
        requested: String,
    },

    /// The short number was never issued by the store.
    #[error("Short number {value} not found")]
    NotFound { value: String },

    /// The short number exists but was never claimed by an allocation.
    #[error("Short number {value} has not been allocated")]
    NotClaimed { value: String },

    /// The caller cancelled the operation before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// The pool configuration is unusable.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Builds a [`Error::Store`] from anything displayable.
    pub fn store(context: impl core::fmt::Display) -> Self {
        Self::Store {
            context: context.to_string(),
        }
    }

    /// Builds the [`Error::Store`] reported when a round trip exceeds its
    /// deadline.
    pub fn timed_out(after: Duration) -> Self {
        Self::Store {
            context: format!("round trip timed out after {after:?}"),
        }
    }

    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Exhaustion clears once the replenishment loop inserts a batch, and
    /// store failures are usually transient. Everything else signals a logic
    /// error on the caller's side.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Store { .. })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::store(err)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::store(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(Error::Exhausted.is_retryable());
        assert!(Error::store("connection reset").is_retryable());
        assert!(Error::timed_out(Duration::from_millis(5)).is_retryable());

        let conflict = Error::Conflict {
            value: "1234567".to_string(),
            existing: "biz-a".to_string(),
            requested: "biz-b".to_string(),
        };
        assert!(!conflict.is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(
            !Error::NotFound {
                value: "1".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn messages_name_the_short_number() {
        let err = Error::Conflict {
            value: "0042".to_string(),
            existing: "biz-a".to_string(),
            requested: "biz-b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Short number 0042 already used by \"biz-a\", refusing \"biz-b\""
        );
        assert_eq!(Error::Exhausted.to_string(), "No short number available for allocation");
    }
}
