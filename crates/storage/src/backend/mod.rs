//! Blob-store trait and implementations.
//!
//! The store is treated as a single-document-per-name capability with
//! whole-document replace semantics: no partial updates, no locking
//! primitive. All concurrency safety above this layer is achieved by
//! read-before-write plus digest comparison.

#[cfg(feature = "mock")]
mod memory;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "mock")]
pub use self::memory::MemoryStore;
#[cfg(feature = "s3")]
pub use self::s3::S3Store;
use crate::error::Result;
use crate::models::BlobInfo;
use async_trait::async_trait;

/// Unified interface for blob storage.
///
/// Blobs are named publicly-readable documents; `put` replaces any existing
/// blob under the same name wholesale and returns its public URL. Writes are
/// atomic single-blob replacements — a crash mid-run never leaves a partial
/// document behind.
///
/// # Examples
///
/// ```no_run
/// use roost_storage::{BlobStore, error::Result};
///
/// async fn manifest_size(store: &dyn BlobStore) -> Result<usize> {
///     let bytes = store.get("content-manifest.json").await?;
///     Ok(bytes.len())
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Name of the configured store (used for logging only).
    fn name(&self) -> &str;

    /// Base URL under which this store's blobs are publicly served. Callers
    /// use this to recognize URLs that already point at owned storage.
    fn base_url(&self) -> &str;

    /// Write a blob, replacing any existing blob under the same name.
    /// Returns the public URL.
    async fn put(&self, name: &str, data: &[u8], content_type: &str) -> Result<String>;

    /// Read a blob's complete contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if no blob
    /// exists under the name.
    async fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// Check for a blob without reading it. Returns its public URL when it
    /// exists, `None` otherwise.
    async fn head(&self, name: &str) -> Result<Option<String>>;

    /// List every blob in the store.
    async fn list(&self) -> Result<Vec<BlobInfo>>;

    /// Delete a blob.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if no blob
    /// exists under the name.
    async fn delete(&self, name: &str) -> Result<()>;
}
