//! In-memory blob store for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use exn::OptionExt;
use tokio::sync::RwLock;

use crate::BlobStore;
use crate::error::{ErrorKind, Result};
use crate::models::BlobInfo;
use crate::name::validate as validate_name;

/// In-memory blob store for testing.
///
/// Blobs live in a `HashMap` behind a [`RwLock`], so all trait methods
/// operate on `&self` without external synchronisation. Put operations are
/// counted so tests can assert write-avoidance properties (no-op
/// persistence, rehost idempotence).
///
/// # Examples
///
/// ```
/// use roost_storage::backend::{BlobStore, MemoryStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::with_documents([
///     ("content-manifest.json", br#"{"posts":[]}"#.as_slice()),
/// ]);
/// assert!(store.head("content-manifest.json").await?.is_some());
/// assert_eq!(store.put_count(), 0);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    name: String,
    base_url: String,
    storage: RwLock<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
}

impl MemoryStore {
    /// Create a store pre-populated with documents.
    ///
    /// Panics on invalid names. If test setup is wrong, the test should not
    /// pass.
    pub fn with_documents(
        documents: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>,
    ) -> Self {
        let mut map = HashMap::new();
        for (name, data) in documents {
            let name = name.into();
            if validate_name(&name).is_err() {
                // The panic here is DELIBERATE. MemoryStore is intended to be
                // used in tests; panics are expected.
                panic!("MemoryStore::with_documents: invalid name {name}");
            }
            map.insert(name, data.into());
        }
        Self {
            name: "memory".to_string(),
            base_url: "memory://roost".to_string(),
            storage: RwLock::new(map),
            puts: AtomicUsize::new(0),
        }
    }

    /// Number of `put` calls made against this store. Pre-population via
    /// [`with_documents`](Self::with_documents) does not count.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        let documents: [(&str, &[u8]); 0] = [];
        Self::with_documents(documents)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn put(&self, name: &str, data: &[u8], _content_type: &str) -> Result<String> {
        let name = validate_name(name)?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.storage.write().await.insert(name.to_string(), data.to_vec());
        Ok(self.url_for(name))
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let name = validate_name(name)?;
        self.storage
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_raise(|| ErrorKind::NotFound(name.to_string()))
    }

    async fn head(&self, name: &str) -> Result<Option<String>> {
        let name = validate_name(name)?;
        Ok(self.storage.read().await.contains_key(name).then(|| self.url_for(name)))
    }

    async fn list(&self) -> Result<Vec<BlobInfo>> {
        let guard = self.storage.read().await;
        Ok(guard
            .iter()
            .map(|(name, data)| BlobInfo {
                name: name.clone(),
                url: self.url_for(name),
                size: data.len() as u64,
            })
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        self.storage
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_raise(|| ErrorKind::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::default();
        let url = store.put("doc.json", b"{}", "application/json").await.unwrap();
        assert_eq!(url, "memory://roost/doc.json");
        assert_eq!(store.get("doc.json").await.unwrap(), b"{}");
        assert_eq!(store.put_count(), 1);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let store = MemoryStore::default();
        let err = store.get("missing.json").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_put_replaces_wholesale() {
        let store = MemoryStore::default();
        store.put("doc.json", b"one", "application/json").await.unwrap();
        store.put("doc.json", b"two", "application/json").await.unwrap();
        assert_eq!(store.get("doc.json").await.unwrap(), b"two");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_head() {
        let store = MemoryStore::with_documents([("a.json", b"1".as_slice())]);
        assert_eq!(store.head("a.json").await.unwrap().as_deref(), Some("memory://roost/a.json"));
        assert_eq!(store.head("b.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::with_documents([("a.json", b"1".as_slice())]);
        store.delete("a.json").await.unwrap();
        assert_eq!(store.head("a.json").await.unwrap(), None);
        let err = store.delete("a.json").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list() {
        let store = MemoryStore::with_documents([
            ("a.json", b"1".as_slice()),
            ("media/b.jpg", b"22".as_slice()),
        ]);
        let mut blobs = store.list().await.unwrap();
        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[1].name, "media/b.jpg");
        assert_eq!(blobs[1].size, 2);
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let store = MemoryStore::default();
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.put("../escape", b"bad", "text/plain").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid name")]
    fn test_with_documents_panics_on_bad_name() {
        MemoryStore::with_documents([("../escape", b"bad".as_slice())]);
    }
}
