//! Capability traits for the remote services the extractor consumes.

use async_trait::async_trait;
use roost_manifest::Comment;

use crate::error::Result;

/// A resolved remote account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Stable account identifier (a DID on Bluesky).
    pub account_id: String,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: String,
}

/// One page of an author feed, newest-first.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    /// Opaque pagination cursor; absent on the last page.
    pub cursor: Option<String>,
}

/// A raw feed entry before enrichment.
#[derive(Debug, Clone)]
pub struct FeedItem {
    /// Stable content identifier of the origin item (the dedup key).
    pub id: String,
    /// Address used for thread-reply lookup.
    pub uri: String,
    pub text: String,
    /// RFC 3339.
    pub created_at: String,
    pub original_link: Option<String>,
    pub like_count: Option<u64>,
    pub images: Vec<ImageRef>,
    pub videos: Vec<VideoRef>,
}

/// An image reference; the retrieval URL is constructed from the account id
/// and this content identifier via [`FeedSource::media_url`].
#[derive(Debug, Clone)]
pub struct ImageRef {
    pub cid: String,
    pub alt_text: String,
    pub width: u32,
    pub height: u32,
}

/// A video reference carrying its raw retrieval URL, used directly as the
/// fallback when transcoding fails.
#[derive(Debug, Clone)]
pub struct VideoRef {
    pub source_url: String,
    pub alt_text: String,
    pub width: u32,
    pub height: u32,
}

/// The remote social-network capability.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Resolve a handle to a stable account identifier and display identity.
    ///
    /// Returns [`ProfileNotFound`](crate::error::ErrorKind::ProfileNotFound)
    /// when resolution fails.
    async fn resolve_profile(&self, handle: &str) -> Result<Profile>;

    /// Fetch one page of the account's posts, newest-first.
    async fn author_feed(&self, account_id: &str, cursor: Option<&str>, limit: u32) -> Result<FeedPage>;

    /// Fetch the direct replies (depth 1) to a post, already hashed.
    async fn thread_replies(&self, post_uri: &str) -> Result<Vec<Comment>>;

    /// Stable retrieval URL for a media blob owned by the account.
    fn media_url(&self, account_id: &str, cid: &str) -> String;
}

/// Result of polling a submitted transcode asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeStatus {
    Pending,
    Ready(TranscodeAsset),
    Errored,
}

/// A finished transcode: playback stream plus derived metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeAsset {
    pub playback_url: String,
    pub thumbnail_url: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// The video-transcoding capability.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Submit a source URL for transcoding; returns an asset id to poll.
    async fn submit(&self, source_url: &str) -> Result<String>;

    /// Poll a submitted asset.
    async fn poll(&self, asset_id: &str) -> Result<TranscodeStatus>;

    /// Host that serves finished playback streams. Media whose source URL
    /// already points here is never re-submitted.
    fn playback_host(&self) -> &str;
}
