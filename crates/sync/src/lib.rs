//! Manifest synchronization: merge, persistence, and media rehosting.
//!
//! The engine composes three manifest sources (the persisted document, an
//! optional offline-import archive, and a fresh feed extraction) into one
//! deduplicated, newest-first manifest, persists it only when its digest
//! changed, and rehosts every referenced media URL into owned blob storage
//! through a persistent URL-mapping cache.

mod engine;
pub mod error;
mod rehost;

pub use crate::engine::{ARCHIVE_DOC, MANIFEST_DOC, Syncer};
pub use crate::rehost::{FetchedMedia, HttpFetcher, IMAGE_CACHE_DOC, MediaFetcher, RehostCache};
