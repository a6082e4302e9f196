//! # DomainError
//!
//! Failure taxonomy shared by every tile-flag operation.

use thiserror::Error;

/// The primary error type for flag, rate-limit and listing operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed, missing or over-limit input. Not retryable.
    #[error("validation error: {0}")]
    Validation(String),

    /// The client exceeded the advisory flag-creation limit.
    #[error("rate limit exceeded: maximum {limit} flags per {window_secs} seconds")]
    RateLimited { limit: u32, window_secs: u64 },

    /// The tile already carries a flag.
    #[error("conflict: {0}")]
    Conflict(String),

    /// No flag exists for the requested tile.
    #[error("{0} not found")]
    NotFound(String),

    /// The backing store call failed. The only variant worth retrying.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A continuation token could not be decoded.
    #[error("invalid pagination cursor: {0}")]
    InvalidCursor(String),
}

impl DomainError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }

    /// Only store failures may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// A specialized Result type for moderation logic.
pub type DomainResult<T> = std::result::Result<T, DomainError>;
