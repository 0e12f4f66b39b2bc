//! Error types for Plenario Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Backend write failed ({operation}): {reason}")]
    Backend { operation: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a failed write so the caller can tell which operation to retry
    pub fn backend(operation: &'static str, source: impl std::fmt::Display) -> Self {
        Error::Backend {
            operation,
            reason: source.to_string(),
        }
    }

    /// Write failures are scoped to one operation and may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Backend { .. } | Error::Database(_) | Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_write_failures_are_retryable() {
        assert!(Error::backend("cast vote", "disk I/O error").is_retryable());
        assert!(!Error::NotFound("bill PL-404".into()).is_retryable());
        assert!(!Error::PermissionDenied("cast vote".into()).is_retryable());
    }
}
