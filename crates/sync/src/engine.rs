//! Manifest synchronization engine.

use std::collections::HashSet;

use exn::{OptionExt, ResultExt};
use roost_feed::{Extractor, FeedSource, Transcoder};
use roost_manifest::{Manifest, merge_manifests, normalize_archive};
use roost_storage::StoreHandle;
use roost_storage::error::ErrorKind as StorageErrorKind;
use tracing::{debug, info, instrument, warn};

use crate::error::{ErrorKind, Result};
use crate::rehost::{IMAGE_CACHE_DOC, MediaFetcher, RehostCache};

/// Name of the authoritative manifest document.
pub const MANIFEST_DOC: &str = "content-manifest.json";
/// Name of the optional offline-import manifest. Read-only here: it is
/// merged in on every sync and never written back.
pub const ARCHIVE_DOC: &str = "archive-manifest.json";

/// Orchestrates one synchronization run: load, merge, extract, persist,
/// rehost.
///
/// Persistence is optimistic. `save_manifest` re-reads the remote document
/// and skips writes whose digest already matches, but two simultaneous runs
/// can still interleave between that read and the put; the last writer wins
/// the whole document. Runs are expected to be serialized by the caller
/// (a single scheduled job).
pub struct Syncer<'a> {
    store: StoreHandle,
    feed: &'a dyn FeedSource,
    transcoder: &'a dyn Transcoder,
    fetcher: &'a dyn MediaFetcher,
    target_handle: String,
    extra_owned_hosts: Vec<String>,
}

impl<'a> Syncer<'a> {
    pub fn new(
        store: StoreHandle,
        feed: &'a dyn FeedSource,
        transcoder: &'a dyn Transcoder,
        fetcher: &'a dyn MediaFetcher,
        target_handle: impl Into<String>,
        extra_owned_hosts: Vec<String>,
    ) -> Self {
        Self {
            store,
            feed,
            transcoder,
            fetcher,
            target_handle: target_handle.into(),
            extra_owned_hosts,
        }
    }

    /// Run a full synchronization and return the resulting manifest.
    ///
    /// Order of composition: persisted manifest, then the normalized archive
    /// import, then freshly extracted posts. Each merge keeps the first copy
    /// of a duplicate id, so the persisted manifest always wins over the
    /// archive, and both win over the feed. The document is rewritten only
    /// when the final digest differs from the one loaded at the start; media
    /// rehosting runs afterwards and never gates the manifest write.
    #[instrument(skip_all, fields(target = %self.target_handle))]
    pub async fn load_full_manifest(&self) -> Result<Manifest> {
        let existing = self.fetch_manifest().await?;
        let baseline = existing.as_ref().map(|manifest| manifest.digest.clone());
        let mut manifest = match existing {
            Some(manifest) => manifest,
            None => Manifest::empty().or_raise(|| ErrorKind::Feed)?,
        };

        if let Some(mut archive) = self.fetch_archive().await {
            info!(posts = archive.posts.len(), "merging archive manifest");
            normalize_archive(&mut archive);
            manifest = merge_manifests(manifest, archive);
        }

        let extractor = Extractor::new(self.feed, self.transcoder);
        let fresh = extractor
            .extract_posts(&self.target_handle, Some(&manifest))
            .await
            .or_raise(|| ErrorKind::Feed)?;
        if !fresh.posts.is_empty() {
            info!(posts = fresh.posts.len(), "merging freshly extracted posts");
            manifest = merge_manifests(manifest, fresh);
        }

        if baseline.as_deref() == Some(manifest.digest.as_str()) {
            debug!("manifest unchanged, skipping write");
        } else {
            self.save_manifest(&manifest).await?;
        }

        self.rehost_manifest_media(&manifest).await?;
        Ok(manifest)
    }

    /// Write the manifest document unless the remote copy already carries
    /// the same digest.
    pub async fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        match self.store.get(MANIFEST_DOC).await {
            Ok(bytes) => {
                if let Ok(remote) = serde_json::from_slice::<Manifest>(&bytes) {
                    if remote.digest == manifest.digest {
                        debug!("remote manifest is identical, skipping write");
                        return Ok(());
                    }
                }
            },
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {},
            Err(err) => return Err(err).or_raise(|| ErrorKind::Storage),
        }
        let bytes = serde_json::to_vec_pretty(manifest).or_raise(|| ErrorKind::Serialization)?;
        let url = self
            .store
            .put(MANIFEST_DOC, &bytes, "application/json")
            .await
            .or_raise(|| ErrorKind::Storage)?;
        info!(posts = manifest.posts.len(), url, "manifest saved");
        Ok(())
    }

    /// Delete the manifest document.
    pub async fn delete_manifest(&self) -> Result<()> {
        self.store.delete(MANIFEST_DOC).await.or_raise(|| ErrorKind::Storage)?;
        info!("manifest deleted");
        Ok(())
    }

    /// Delete every blob that is neither a system document nor referenced by
    /// the current manifest, directly or through a rehost-cache mapping.
    #[instrument(skip_all)]
    pub async fn cleanup_unused_blobs(&self) -> Result<()> {
        let manifest = self.fetch_manifest().await?.ok_or_raise(|| ErrorKind::Storage)?;
        let mut cache = self.open_cache();
        cache.initialize().await?;

        let mut used: HashSet<String> =
            [MANIFEST_DOC, ARCHIVE_DOC, IMAGE_CACHE_DOC].iter().map(ToString::to_string).collect();
        for url in manifest_media_urls(&manifest) {
            if let Some(name) = self.owned_blob_name(url) {
                used.insert(name);
            }
            if let Some(name) = cache.resolve(url).and_then(|owned| self.owned_blob_name(owned)) {
                used.insert(name);
            }
        }

        let blobs = self.store.list().await.or_raise(|| ErrorKind::Storage)?;
        let mut deleted = 0usize;
        for blob in blobs {
            if used.contains(&blob.name) {
                continue;
            }
            debug!(name = blob.name, "deleting unused blob");
            self.store.delete(&blob.name).await.or_raise(|| ErrorKind::Storage)?;
            deleted += 1;
        }
        info!(deleted, "cleanup complete");
        Ok(())
    }

    async fn fetch_manifest(&self) -> Result<Option<Manifest>> {
        match self.store.get(MANIFEST_DOC).await {
            Ok(bytes) => {
                let manifest = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Serialization)?;
                Ok(Some(manifest))
            },
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
                debug!("no manifest document, starting from scratch");
                Ok(None)
            },
            Err(err) => Err(err).or_raise(|| ErrorKind::Storage),
        }
    }

    /// Best-effort: an archive that is missing, unreadable or malformed is
    /// skipped for this run rather than failing the sync.
    async fn fetch_archive(&self) -> Option<Manifest> {
        match self.store.get(ARCHIVE_DOC).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(archive) => Some(archive),
                Err(err) => {
                    warn!(error = %err, "archive manifest is malformed, skipping");
                    None
                },
            },
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => None,
            Err(err) => {
                warn!(error = %err, "archive manifest could not be read, skipping");
                None
            },
        }
    }

    /// Run the rehost cache over every URL the manifest references: media
    /// sources, thumbnails, and post- and comment-author avatars.
    async fn rehost_manifest_media(&self, manifest: &Manifest) -> Result<()> {
        let mut cache = self.open_cache();
        cache.initialize().await?;
        for url in manifest_media_urls(manifest) {
            cache.rehost(url).await;
        }
        cache.persist().await
    }

    fn open_cache(&self) -> RehostCache<'a> {
        RehostCache::new(self.store.clone(), self.fetcher, &self.extra_owned_hosts)
    }

    /// The blob name behind an owned URL, `None` for foreign URLs.
    fn owned_blob_name(&self, url: &str) -> Option<String> {
        let rest = url.strip_prefix(self.store.base_url())?;
        Some(rest.trim_start_matches('/').to_string())
    }
}

/// Every rehostable URL in the manifest, skipping empty avatar fields.
fn manifest_media_urls(manifest: &Manifest) -> impl Iterator<Item = &str> {
    manifest.posts.iter().flat_map(|post| {
        let media = post.media.iter().flat_map(|item| {
            std::iter::once(item.source_url.as_str()).chain(item.thumbnail_url.as_deref())
        });
        let post_avatar = post.author.as_ref().map(|author| author.avatar_url.as_str());
        let comment_avatars = post
            .comments
            .iter()
            .flatten()
            .map(|comment| comment.author.avatar_url.as_str());
        media
            .chain(post_avatar)
            .chain(comment_avatars)
            .filter(|url| !url.is_empty())
    })
}
