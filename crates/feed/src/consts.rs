use std::time::Duration;

/// Posts requested per feed page.
pub const PAGE_SIZE: u32 = 50;

/// Concurrent per-post enrichment (media + comments) within one page.
/// Bounded to respect upstream rate limits; results join positionally so
/// feed order is preserved regardless of completion order.
pub const ENRICH_CONCURRENCY: usize = 4;

/// Transcode poll ceiling: 60 attempts at 5s spacing, a 5-minute ceiling.
pub const TRANSCODE_POLL_ATTEMPTS: u32 = 60;
pub const TRANSCODE_POLL_DELAY: Duration = Duration::from_secs(5);
