//! Remote-feed capability and incremental post extraction.
//!
//! The extractor pages through a remote account's posts newest-first,
//! enriches each post with media, resolved video streams and direct replies,
//! applies an incremental cutoff derived from the newest already-archived
//! post, and emits a freshly hashed manifest fragment for the merge engine.
//!
//! Failure policy: account-level failures (authentication, profile
//! resolution, page fetch) abort the run; entity-level failures (one post's
//! comments, one media item's transcode) degrade locally and never abort
//! the batch.

mod bluesky;
mod consts;
pub mod error;
mod extract;
mod traits;
mod transcode;

pub use crate::bluesky::{BlueskyClient, DEFAULT_SERVICE};
pub use crate::consts::{ENRICH_CONCURRENCY, PAGE_SIZE, TRANSCODE_POLL_ATTEMPTS, TRANSCODE_POLL_DELAY};
pub use crate::extract::Extractor;
pub use crate::traits::{
    FeedItem, FeedPage, FeedSource, ImageRef, Profile, TranscodeAsset, TranscodeStatus, Transcoder,
    VideoRef,
};
pub use crate::transcode::MuxTranscoder;
