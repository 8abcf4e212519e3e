//! Incremental feed extraction.

use exn::ResultExt;
use futures::{StreamExt, stream};
use roost_manifest::{Author, Manifest, MediaItem, MediaKind, Post, parse_rfc3339};
use tracing::{debug, info, instrument, warn};

use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::traits::{FeedItem, FeedSource, Profile, TranscodeStatus, Transcoder, VideoRef};

/// Pages through a remote account's posts and produces a freshly hashed
/// manifest fragment.
///
/// Holds no state between runs: the account identity (handle, display name,
/// avatar) is resolved once per extraction and stamped onto every post, so
/// there is no process-lifetime avatar cache to go stale.
pub struct Extractor<'a> {
    source: &'a dyn FeedSource,
    transcoder: &'a dyn Transcoder,
}

impl<'a> Extractor<'a> {
    pub fn new(source: &'a dyn FeedSource, transcoder: &'a dyn Transcoder) -> Self {
        Self { source, transcoder }
    }

    /// Extract all posts newer than the newest post in `existing`.
    ///
    /// Pages are fetched newest-first, so hitting a post strictly older than
    /// the cutoff is a valid early exit. A post dated *exactly* at the cutoff
    /// is excluded but does not stop paging. Without `existing`, the whole
    /// feed is extracted.
    ///
    /// All-or-nothing at the profile level, best-effort at the post, comment
    /// and media level.
    #[instrument(skip_all, fields(handle))]
    pub async fn extract_posts(&self, handle: &str, existing: Option<&Manifest>) -> Result<Manifest> {
        let profile = self.source.resolve_profile(handle).await?;
        let author = Author::new(&profile.handle, &profile.display_name, &profile.avatar_url);
        let since = existing.and_then(Manifest::newest_post_time);

        let mut kept: Vec<Post> = Vec::new();
        let mut cursor: Option<String> = None;
        'pages: loop {
            let page = self
                .source
                .author_feed(&profile.account_id, cursor.as_deref(), consts::PAGE_SIZE)
                .await?;
            if page.items.is_empty() {
                break;
            }
            // Bounded fan-out; `buffered` joins positionally so feed order
            // survives regardless of completion order.
            let enriched: Vec<Post> = stream::iter(page.items)
                .map(|item| self.enrich(&profile, &author, existing, item))
                .buffered(consts::ENRICH_CONCURRENCY)
                .collect()
                .await;
            for post in enriched {
                match (since, parse_rfc3339(&post.created_at)) {
                    // Strictly older than the cutoff: everything further down
                    // the feed is older still.
                    (Some(since), Some(at)) if at < since => break 'pages,
                    // Boundary-exact: already archived, skip but keep paging.
                    (Some(since), Some(at)) if at == since => continue,
                    (Some(_), None) => {
                        debug!(id = %post.id, "skipping post with unparseable timestamp");
                        continue;
                    },
                    _ => kept.push(post),
                }
            }
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        info!(posts = kept.len(), "extraction complete");
        Manifest::new(kept).or_raise(|| ErrorKind::Clock)
    }

    /// Enrich one feed entry into a hashed post. Infallible by design: the
    /// degradations (empty comments, raw video source) happen in here.
    async fn enrich(
        &self,
        profile: &Profile,
        author: &Author,
        existing: Option<&Manifest>,
        item: FeedItem,
    ) -> Post {
        let mut media = Vec::with_capacity(item.images.len() + item.videos.len());
        for image in &item.images {
            media.push(MediaItem::image(
                self.source.media_url(&profile.account_id, &image.cid),
                &image.alt_text,
                image.width,
                image.height,
            ));
        }
        let prior_streams = prior_streams(existing, &item.id, self.transcoder.playback_host());
        for (index, video) in item.videos.into_iter().enumerate() {
            media.push(self.resolve_video(prior_streams.get(index), &item.id, video).await);
        }

        let comments = match self.source.thread_replies(&item.uri).await {
            Ok(comments) => comments,
            Err(err) => {
                warn!(uri = %item.uri, error = %err, "comment fetch failed, archiving without replies");
                Vec::new()
            },
        };

        let mut post = Post {
            id: item.id,
            media,
            text: item.text,
            created_at: item.created_at,
            original_link: item.original_link,
            like_count: item.like_count,
            comments: Some(comments),
            author: Some(author.clone()),
            digest: String::new(),
        };
        post.rehash();
        post
    }

    /// Resolve one video reference to playable media.
    ///
    /// A stream already transcoded for the same slot of the same post in a
    /// previous run is reused verbatim — re-submitting the same source would
    /// mint a second asset for identical content. Transcode failure and
    /// timeout fall back to the raw source URL rather than dropping the item.
    async fn resolve_video(&self, prior: Option<&MediaItem>, post_id: &str, video: VideoRef) -> MediaItem {
        if let Some(item) = prior {
            debug!(post_id, "reusing previously transcoded stream");
            return item.clone();
        }
        match self.transcode(&video).await {
            Ok(item) => item,
            Err(err) => {
                warn!(url = %video.source_url, error = %err, "transcode failed, falling back to raw source");
                MediaItem::video(video.source_url, video.alt_text, video.width, video.height)
            },
        }
    }

    async fn transcode(&self, video: &VideoRef) -> Result<MediaItem> {
        let asset_id = self.transcoder.submit(&video.source_url).await?;
        for _ in 0..consts::TRANSCODE_POLL_ATTEMPTS {
            match self.transcoder.poll(&asset_id).await? {
                TranscodeStatus::Pending => tokio::time::sleep(consts::TRANSCODE_POLL_DELAY).await,
                TranscodeStatus::Ready(asset) => {
                    let mut item = MediaItem::video(
                        asset.playback_url,
                        &video.alt_text,
                        if asset.width > 0 { asset.width } else { video.width },
                        if asset.height > 0 { asset.height } else { video.height },
                    );
                    item.thumbnail_url = asset.thumbnail_url;
                    return Ok(item);
                },
                TranscodeStatus::Errored => exn::bail!(ErrorKind::TranscodeFailed),
            }
        }
        exn::bail!(ErrorKind::TranscodeTimedOut)
    }
}

/// Streams already transcoded for `post_id` in a previous run, in stored
/// order. Reuse is positional: the nth video of the post maps to the nth
/// stream, so a post with several videos never shares one stream.
fn prior_streams(existing: Option<&Manifest>, post_id: &str, playback_host: &str) -> Vec<MediaItem> {
    existing
        .and_then(|manifest| manifest.posts.iter().find(|post| post.id == post_id))
        .map(|post| {
            post.media
                .iter()
                .filter(|item| {
                    item.kind == MediaKind::Video && item.source_url.contains(playback_host)
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}
