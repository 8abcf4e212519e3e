//! RFC 3339 timestamp helpers.
//!
//! Timestamps are stored as strings throughout the data model (matching the
//! persisted JSON documents) and only parsed where ordering matters: the
//! merge sort and the extraction cutoff.

use exn::ResultExt;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{ErrorKind, Result};

/// The current UTC instant as an RFC 3339 string.
pub fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).or_raise(|| ErrorKind::TimestampFormat)
}

/// Parse an RFC 3339 timestamp, returning `None` when unparseable.
///
/// Lenient on purpose: a post with a garbled `createdAt` still has to survive
/// a merge (it sorts to the end rather than aborting the run).
pub fn parse_rfc3339(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}
