//! Media rehosting with a persistent URL-mapping cache.

use std::collections::BTreeMap;

use async_trait::async_trait;
use exn::ResultExt;
use roost_storage::StoreHandle;
use roost_storage::error::ErrorKind as StorageErrorKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ErrorKind, Result};

/// Name of the persisted cache document.
pub const IMAGE_CACHE_DOC: &str = "image-cache.json";

/// Raw media pulled from an origin server.
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Capability for downloading media bytes from an arbitrary URL.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia>;
}

/// [`MediaFetcher`] over plain HTTP.
#[derive(Default)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .or_raise(|| ErrorKind::RehostFailed(url.to_string()))?;
        if !response.status().is_success() {
            exn::bail!(ErrorKind::RehostFailed(url.to_string()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response
            .bytes()
            .await
            .or_raise(|| ErrorKind::RehostFailed(url.to_string()))?
            .to_vec();
        Ok(FetchedMedia { bytes, content_type })
    }
}

/// Wire form of the cache document. The digest covers the sorted entry list
/// and is how concurrent writers detect each other.
#[derive(Serialize, Deserialize)]
struct CacheDocument {
    #[serde(rename = "hash")]
    digest: String,
    cache: BTreeMap<String, String>,
}

/// Maps origin media URLs to owned-storage URLs, backed by a single JSON
/// document in the blob store.
///
/// Cache keys are complete origin URLs. Blob-endpoint URLs differ only in
/// their query string, so the query is part of the identity and must not be
/// normalized away. A URL that fails to rehost is mapped to itself and never
/// retried. Mappings are only ever added, never invalidated.
pub struct RehostCache<'a> {
    store: StoreHandle,
    fetcher: &'a dyn MediaFetcher,
    owned_hosts: Vec<String>,
    entries: BTreeMap<String, String>,
    /// Digest of the document as last loaded or written; `persist` compares
    /// against this to skip no-op writes and to detect remote drift.
    persisted_digest: String,
}

impl<'a> RehostCache<'a> {
    pub fn new(store: StoreHandle, fetcher: &'a dyn MediaFetcher, extra_owned_hosts: &[String]) -> Self {
        let mut owned_hosts = vec![store.base_url().to_string()];
        owned_hosts.extend(extra_owned_hosts.iter().cloned());
        Self {
            store,
            fetcher,
            owned_hosts,
            entries: BTreeMap::new(),
            persisted_digest: String::new(),
        }
    }

    /// Load the persisted cache document. A missing document starts the
    /// cache empty; any other storage failure propagates.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.store.get(IMAGE_CACHE_DOC).await {
            Ok(bytes) => {
                let document: CacheDocument =
                    serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Serialization)?;
                self.persisted_digest = document.digest;
                self.entries = document.cache;
                debug!(entries = self.entries.len(), "cache document loaded");
            },
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
                debug!("no cache document found, starting fresh");
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Storage),
        }
        Ok(())
    }

    /// Return an owned URL for `url`, rehosting it on first sight.
    ///
    /// Never fails: a URL that cannot be fetched or stored is mapped to
    /// itself so the failure is not retried on every run.
    pub async fn rehost(&mut self, url: &str) -> String {
        if let Some(mapped) = self.entries.get(url) {
            return mapped.clone();
        }
        if self.is_owned(url) {
            self.entries.insert(url.to_string(), url.to_string());
            return url.to_string();
        }
        match self.fetch_and_store(url).await {
            Ok(owned) => {
                self.entries.insert(url.to_string(), owned.clone());
                owned
            },
            Err(err) => {
                warn!(url, error = %err, "rehost failed, keeping origin URL");
                self.entries.insert(url.to_string(), url.to_string());
                url.to_string()
            },
        }
    }

    /// Read-side join: the owned URL for an origin URL, if one was ever
    /// recorded. Callers resolve at display time; stored manifests keep
    /// origin URLs.
    pub fn resolve(&self, url: &str) -> Option<&str> {
        self.entries.get(url).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache document back, merging in any entries another writer
    /// persisted since this cache was loaded. Local mappings win on key
    /// collision. The put is skipped entirely when nothing changed.
    #[instrument(skip_all)]
    pub async fn persist(&mut self) -> Result<()> {
        let mut digest = digest_entries(&self.entries)?;
        match self.store.get(IMAGE_CACHE_DOC).await {
            Ok(bytes) => {
                if let Ok(remote) = serde_json::from_slice::<CacheDocument>(&bytes) {
                    if remote.digest != self.persisted_digest {
                        for (key, value) in remote.cache {
                            self.entries.entry(key).or_insert(value);
                        }
                        digest = digest_entries(&self.entries)?;
                    }
                }
            },
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {},
            Err(err) => {
                warn!(error = %err, "could not re-read cache document, writing anyway");
            },
        }
        if digest == self.persisted_digest {
            return Ok(());
        }
        let document = CacheDocument { digest: digest.clone(), cache: self.entries.clone() };
        let bytes = serde_json::to_vec_pretty(&document).or_raise(|| ErrorKind::Serialization)?;
        self.store
            .put(IMAGE_CACHE_DOC, &bytes, "application/json")
            .await
            .or_raise(|| ErrorKind::Storage)?;
        self.persisted_digest = digest;
        info!(entries = self.entries.len(), "cache document updated");
        Ok(())
    }

    fn is_owned(&self, url: &str) -> bool {
        self.owned_hosts.iter().any(|host| url.contains(host.as_str()))
    }

    async fn fetch_and_store(&self, url: &str) -> Result<String> {
        let media = self.fetcher.fetch(url).await?;
        let name = match extension_for(&media.content_type) {
            Some(extension) => format!("{}.{extension}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        debug!(url, name, "rehosting media");
        self.store
            .put(&name, &media.bytes, &media.content_type)
            .await
            .or_raise(|| ErrorKind::RehostFailed(url.to_string()))
    }
}

fn digest_entries(entries: &BTreeMap<String, String>) -> Result<String> {
    let sorted: Vec<(&String, &String)> = entries.iter().collect();
    let json = serde_json::to_vec(&sorted).or_raise(|| ErrorKind::Serialization)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    const TABLE: &[(&str, &str)] = &[
        ("image/jpeg", "jpg"),
        ("image/jpg", "jpg"),
        ("image/png", "png"),
        ("image/gif", "gif"),
        ("image/webp", "webp"),
        ("image/svg", "svg"),
        ("video/mp4", "mp4"),
        ("video/webm", "webm"),
        ("video/ogg", "ogv"),
        ("video/avi", "avi"),
        ("video/mov", "mov"),
        ("video/quicktime", "mov"),
        ("video/wmv", "wmv"),
        ("video/flv", "flv"),
        ("video/mkv", "mkv"),
    ];
    TABLE
        .iter()
        .find(|(mime, _)| content_type.contains(mime))
        .map(|(_, extension)| *extension)
}
