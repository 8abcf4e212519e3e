//! Content-addressed data model for archived social posts.
//!
//! Every entity carries a `digest`: a deterministic fingerprint of its fields
//! used for equality and conflict detection (never for security). Two
//! manifests are considered equal iff their digests are equal — there is no
//! vector clock or per-post versioning anywhere in the system, so any
//! mutation of an entity **must** be followed by a digest recomputation
//! before the entity is compared or persisted.

pub mod error;
pub mod hash;
mod merge;
pub mod models;
mod normalize;
mod timestamp;

pub use crate::hash::HashBuilder;
pub use crate::merge::merge_manifests;
pub use crate::models::{Author, Comment, Manifest, MediaItem, MediaKind, Post};
pub use crate::normalize::normalize_archive;
pub use crate::timestamp::{now_rfc3339, parse_rfc3339};
