//! Sync Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Feed extraction aborted; the persisted manifest is untouched.
    #[display("feed extraction failed")]
    Feed,
    /// A blob-store operation failed.
    #[display("blob storage operation failed")]
    Storage,
    /// A stored document could not be encoded or decoded as JSON.
    #[display("document serialization failed")]
    Serialization,
    /// One URL could not be rehosted. Recovered inside the cache by mapping
    /// the URL to itself; exists for logging and direct callers.
    #[display("failed to rehost {_0}")]
    RehostFailed(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::RehostFailed(_))
    }
}
