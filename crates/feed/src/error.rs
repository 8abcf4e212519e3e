//! Feed Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A feed error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// Only the first three ever escape an extraction run; the per-entity kinds
/// are recovered inside the extractor (empty comment list, raw-source
/// fallback) and exist for logging and for callers driving the capabilities
/// directly.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The handle could not be resolved to an account. Fatal for the run.
    #[display("profile not found: {_0}")]
    ProfileNotFound(#[error(not(source))] String),
    /// Credentials were rejected by the remote service. Fatal for the run.
    #[display("authentication failed")]
    AuthFailed,
    /// A feed page could not be fetched or parsed. Fatal for the run; the
    /// previously persisted manifest is untouched.
    #[display("feed fetch failed: {_0}")]
    FeedFetchFailed(#[error(not(source))] String),
    /// Replies for one post could not be fetched. Recovered per-post.
    #[display("comment fetch failed for {_0}")]
    CommentFetchFailed(#[error(not(source))] String),
    /// The transcode service rejected or failed an asset. Recovered per-item.
    #[display("transcode failed")]
    TranscodeFailed,
    /// The transcode poll ceiling was exceeded. Recovered per-item.
    #[display("transcode timed out")]
    TranscodeTimedOut,
    /// The system clock could not be rendered as a timestamp.
    #[display("failed to read system clock")]
    Clock,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FeedFetchFailed(_) | Self::CommentFetchFailed(_) | Self::TranscodeTimedOut
        )
    }
}
