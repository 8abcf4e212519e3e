//! AT Protocol client for reading an account's feed.

use async_trait::async_trait;
use exn::ResultExt;
use reqwest::StatusCode;
use roost_manifest::{Author, Comment};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::{ErrorKind, Result};
use crate::traits::{FeedItem, FeedPage, FeedSource, ImageRef, Profile, VideoRef};

pub const DEFAULT_SERVICE: &str = "https://bsky.social";
pub const PUBLIC_API: &str = "https://public.api.bsky.app";

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Client over the public AT Protocol read endpoints.
///
/// Reads go to the unauthenticated public API unless a session was opened
/// with [`BlueskyClient::login`], in which case they go to the account's
/// service host with a bearer token. Blob URLs always point at the service
/// host, where `com.atproto.sync.getBlob` lives.
pub struct BlueskyClient {
    http: reqwest::Client,
    service: String,
    access_token: Option<String>,
}

impl BlueskyClient {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            service: service.into(),
            access_token: None,
        }
    }

    /// Open an app-password session. Subsequent reads are authenticated,
    /// which lifts the public API's rate limits.
    #[instrument(skip_all, fields(identifier))]
    pub async fn login(&mut self, identifier: &str, password: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/xrpc/com.atproto.server.createSession", self.service))
            .json(&serde_json::json!({ "identifier": identifier, "password": password }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .or_raise(|| ErrorKind::AuthFailed)?;
        if !response.status().is_success() {
            exn::bail!(ErrorKind::AuthFailed);
        }
        let session: CreateSessionResponse = response.json().await.or_raise(|| ErrorKind::AuthFailed)?;
        debug!("session established");
        self.access_token = Some(session.access_jwt);
        Ok(())
    }

    fn get(&self, nsid: &str) -> reqwest::RequestBuilder {
        let base = if self.access_token.is_some() { &self.service } else { PUBLIC_API };
        let request = self.http.get(format!("{base}/xrpc/{nsid}")).timeout(REQUEST_TIMEOUT);
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn feed_item_from_view(&self, view: BskyPostView) -> FeedItem {
        let mut images = Vec::new();
        let mut videos = Vec::new();
        match view.record.embed {
            Some(BskyEmbed::Images { images: refs }) => {
                for image in refs {
                    let Some(cid) = image.image.and_then(|blob| blob.cid()) else {
                        warn!(uri = %view.uri, "image embed without a blob link");
                        continue;
                    };
                    let (width, height) = image.aspect_ratio.map_or((0, 0), |r| (r.width, r.height));
                    images.push(ImageRef {
                        cid,
                        alt_text: image.alt.unwrap_or_default(),
                        width,
                        height,
                    });
                }
            },
            Some(BskyEmbed::Video { video, alt, aspect_ratio }) => {
                if let Some(cid) = video.cid() {
                    let (width, height) = aspect_ratio.map_or((0, 0), |r| (r.width, r.height));
                    videos.push(VideoRef {
                        source_url: self.media_url(&view.author.did, &cid),
                        alt_text: alt.unwrap_or_default(),
                        width,
                        height,
                    });
                } else {
                    warn!(uri = %view.uri, "video embed without a blob link");
                }
            },
            Some(BskyEmbed::Other) | None => {},
        }

        let text = match view.record.text {
            Some(text) if !text.is_empty() => text,
            _ => "No text content".to_string(),
        };

        FeedItem {
            id: view.cid,
            original_link: permalink(&view.uri, &view.author.handle),
            uri: view.uri,
            text,
            created_at: view.record.created_at.unwrap_or(view.indexed_at),
            like_count: view.like_count,
            images,
            videos,
        }
    }
}

/// `at://did:plc:xxx/app.bsky.feed.post/rkey` to the public web permalink.
fn permalink(uri: &str, handle: &str) -> Option<String> {
    let rkey = uri.rsplit('/').next()?;
    Some(format!("https://bsky.app/profile/{handle}/post/{rkey}"))
}

#[async_trait]
impl FeedSource for BlueskyClient {
    #[instrument(skip(self))]
    async fn resolve_profile(&self, handle: &str) -> Result<Profile> {
        let response = self
            .get("app.bsky.actor.getProfile")
            .query(&[("actor", handle)])
            .send()
            .await
            .or_raise(|| ErrorKind::FeedFetchFailed(handle.to_string()))?;
        if matches!(response.status(), StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND) {
            exn::bail!(ErrorKind::ProfileNotFound(handle.to_string()));
        }
        if !response.status().is_success() {
            exn::bail!(ErrorKind::FeedFetchFailed(handle.to_string()));
        }
        let profile: GetProfileResponse = response
            .json()
            .await
            .or_raise(|| ErrorKind::FeedFetchFailed(handle.to_string()))?;
        Ok(Profile {
            account_id: profile.did,
            display_name: profile.display_name.unwrap_or_else(|| profile.handle.clone()),
            handle: profile.handle,
            avatar_url: profile.avatar.unwrap_or_default(),
        })
    }

    #[instrument(skip(self, cursor))]
    async fn author_feed(&self, account_id: &str, cursor: Option<&str>, limit: u32) -> Result<FeedPage> {
        let mut query = vec![("actor", account_id.to_string()), ("limit", limit.min(100).to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        let response = self
            .get("app.bsky.feed.getAuthorFeed")
            .query(&query)
            .send()
            .await
            .or_raise(|| ErrorKind::FeedFetchFailed(account_id.to_string()))?;
        if !response.status().is_success() {
            exn::bail!(ErrorKind::FeedFetchFailed(account_id.to_string()));
        }
        let feed: AuthorFeedResponse = response
            .json()
            .await
            .or_raise(|| ErrorKind::FeedFetchFailed(account_id.to_string()))?;
        Ok(FeedPage {
            items: feed.feed.into_iter().map(|item| self.feed_item_from_view(item.post)).collect(),
            cursor: feed.cursor,
        })
    }

    /// Direct replies only (`depth=1`), in thread order.
    #[instrument(skip(self))]
    async fn thread_replies(&self, post_uri: &str) -> Result<Vec<Comment>> {
        let response = self
            .get("app.bsky.feed.getPostThread")
            .query(&[("uri", post_uri), ("depth", "1")])
            .send()
            .await
            .or_raise(|| ErrorKind::CommentFetchFailed(post_uri.to_string()))?;
        if !response.status().is_success() {
            exn::bail!(ErrorKind::CommentFetchFailed(post_uri.to_string()));
        }
        let thread: GetPostThreadResponse = response
            .json()
            .await
            .or_raise(|| ErrorKind::CommentFetchFailed(post_uri.to_string()))?;
        let BskyThreadNode::Post { replies, .. } = thread.thread else {
            return Ok(Vec::new());
        };
        Ok(replies
            .into_iter()
            .filter_map(|node| match node {
                BskyThreadNode::Post { post, .. } => Some(comment_from_view(post)),
                BskyThreadNode::Other => None,
            })
            .collect())
    }

    fn media_url(&self, account_id: &str, cid: &str) -> String {
        format!("{}/xrpc/com.atproto.sync.getBlob?did={account_id}&cid={cid}", self.service)
    }
}

fn comment_from_view(view: BskyPostView) -> Comment {
    let author = Author::new(
        view.author.handle.clone(),
        view.author.display_name.as_deref().unwrap_or(&view.author.handle),
        view.author.avatar.unwrap_or_default(),
    );
    Comment::new(
        author,
        view.record.text.unwrap_or_default(),
        permalink(&view.uri, &view.author.handle),
        Some(view.record.created_at.unwrap_or(view.indexed_at)),
    )
}

// Wire types, narrowed to the fields read here.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    access_jwt: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetProfileResponse {
    did: String,
    handle: String,
    display_name: Option<String>,
    avatar: Option<String>,
}

#[derive(Deserialize)]
struct AuthorFeedResponse {
    feed: Vec<BskyFeedItem>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct BskyFeedItem {
    post: BskyPostView,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BskyPostView {
    uri: String,
    cid: String,
    author: BskyAuthor,
    record: BskyRecord,
    indexed_at: String,
    like_count: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BskyAuthor {
    did: String,
    handle: String,
    display_name: Option<String>,
    avatar: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BskyRecord {
    text: Option<String>,
    created_at: Option<String>,
    embed: Option<BskyEmbed>,
}

#[derive(Deserialize)]
#[serde(tag = "$type")]
enum BskyEmbed {
    #[serde(rename = "app.bsky.embed.images")]
    Images { images: Vec<BskyEmbedImage> },
    #[serde(rename = "app.bsky.embed.video")]
    Video {
        video: BskyBlob,
        alt: Option<String>,
        #[serde(rename = "aspectRatio")]
        aspect_ratio: Option<BskyAspectRatio>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct BskyEmbedImage {
    image: Option<BskyBlob>,
    alt: Option<String>,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: Option<BskyAspectRatio>,
}

#[derive(Deserialize, Clone)]
struct BskyBlob {
    #[serde(rename = "ref")]
    reference: Option<BskyBlobRef>,
}

impl BskyBlob {
    fn cid(self) -> Option<String> {
        self.reference.map(|r| r.link)
    }
}

#[derive(Deserialize, Clone)]
struct BskyBlobRef {
    #[serde(rename = "$link")]
    link: String,
}

#[derive(Deserialize, Clone, Copy)]
struct BskyAspectRatio {
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct GetPostThreadResponse {
    thread: BskyThreadNode,
}

#[derive(Deserialize)]
#[serde(tag = "$type")]
enum BskyThreadNode {
    #[serde(rename = "app.bsky.feed.defs#threadViewPost")]
    Post {
        post: BskyPostView,
        #[serde(default)]
        replies: Vec<BskyThreadNode>,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_view_json(embed: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "uri": "at://did:plc:abc/app.bsky.feed.post/3kxyz",
            "cid": "bafyreib2post",
            "author": {
                "did": "did:plc:abc",
                "handle": "target.example",
                "displayName": "Target",
                "avatar": "https://cdn.example/avatar.jpg"
            },
            "record": {
                "text": "hello world",
                "createdAt": "2024-01-01T00:00:00Z",
                "embed": embed
            },
            "indexedAt": "2024-01-01T00:00:05Z",
            "likeCount": 3
        })
    }

    #[test]
    fn test_permalink_uses_last_uri_segment() {
        assert_eq!(
            permalink("at://did:plc:abc/app.bsky.feed.post/3kxyz", "target.example").as_deref(),
            Some("https://bsky.app/profile/target.example/post/3kxyz"),
        );
    }

    #[test]
    fn test_media_url_points_at_service_host() {
        let client = BlueskyClient::new(DEFAULT_SERVICE);
        assert_eq!(
            client.media_url("did:plc:abc", "bafyreib2img"),
            "https://bsky.social/xrpc/com.atproto.sync.getBlob?did=did:plc:abc&cid=bafyreib2img",
        );
    }

    #[test]
    fn test_image_embed_becomes_image_ref() {
        let view: BskyPostView = serde_json::from_value(post_view_json(serde_json::json!({
            "$type": "app.bsky.embed.images",
            "images": [{
                "image": { "ref": { "$link": "bafyreib2img" }, "mimeType": "image/jpeg" },
                "alt": "a cat",
                "aspectRatio": { "width": 640, "height": 480 }
            }]
        })))
        .unwrap();
        let item = BlueskyClient::new(DEFAULT_SERVICE).feed_item_from_view(view);

        assert_eq!(item.id, "bafyreib2post");
        assert_eq!(item.text, "hello world");
        assert_eq!(item.created_at, "2024-01-01T00:00:00Z");
        assert_eq!(item.like_count, Some(3));
        assert_eq!(item.original_link.as_deref(), Some("https://bsky.app/profile/target.example/post/3kxyz"));
        assert_eq!(item.images.len(), 1);
        assert_eq!(item.images[0].cid, "bafyreib2img");
        assert_eq!(item.images[0].alt_text, "a cat");
        assert_eq!((item.images[0].width, item.images[0].height), (640, 480));
        assert!(item.videos.is_empty());
    }

    #[test]
    fn test_video_embed_becomes_blob_url() {
        let view: BskyPostView = serde_json::from_value(post_view_json(serde_json::json!({
            "$type": "app.bsky.embed.video",
            "video": { "ref": { "$link": "bafyreib2vid" }, "mimeType": "video/mp4" },
            "aspectRatio": { "width": 1280, "height": 720 }
        })))
        .unwrap();
        let item = BlueskyClient::new(DEFAULT_SERVICE).feed_item_from_view(view);

        assert!(item.images.is_empty());
        assert_eq!(
            item.videos[0].source_url,
            "https://bsky.social/xrpc/com.atproto.sync.getBlob?did=did:plc:abc&cid=bafyreib2vid",
        );
        assert_eq!((item.videos[0].width, item.videos[0].height), (1280, 720));
    }

    #[test]
    fn test_unknown_embed_and_empty_text_fall_back() {
        let mut json = post_view_json(serde_json::json!({
            "$type": "app.bsky.embed.external",
            "external": { "uri": "https://example.com" }
        }));
        json["record"]["text"] = serde_json::json!("");
        let view: BskyPostView = serde_json::from_value(json).unwrap();
        let item = BlueskyClient::new(DEFAULT_SERVICE).feed_item_from_view(view);

        assert!(item.images.is_empty() && item.videos.is_empty());
        assert_eq!(item.text, "No text content");
    }

    #[test]
    fn test_thread_replies_map_to_comments() {
        let thread: GetPostThreadResponse = serde_json::from_value(serde_json::json!({
            "thread": {
                "$type": "app.bsky.feed.defs#threadViewPost",
                "post": post_view_json(serde_json::Value::Null),
                "replies": [
                    {
                        "$type": "app.bsky.feed.defs#threadViewPost",
                        "post": {
                            "uri": "at://did:plc:other/app.bsky.feed.post/3kreply",
                            "cid": "bafyreib2reply",
                            "author": { "did": "did:plc:other", "handle": "reply.example" },
                            "record": { "text": "nice one", "createdAt": "2024-01-01T01:00:00Z" },
                            "indexedAt": "2024-01-01T01:00:05Z"
                        }
                    },
                    { "$type": "app.bsky.feed.defs#blockedPost" }
                ]
            }
        }))
        .unwrap();

        let BskyThreadNode::Post { replies, .. } = thread.thread else {
            panic!("thread root should parse as a post");
        };
        let comments: Vec<Comment> = replies
            .into_iter()
            .filter_map(|node| match node {
                BskyThreadNode::Post { post, .. } => Some(comment_from_view(post)),
                BskyThreadNode::Other => None,
            })
            .collect();

        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author.handle, "reply.example");
        assert_eq!(comments[0].author.display_name, "reply.example");
        assert_eq!(comments[0].text, "nice one");
        assert_eq!(
            comments[0].original_link.as_deref(),
            Some("https://bsky.app/profile/reply.example/post/3kreply"),
        );
        assert_eq!(comments[0].created_at.as_deref(), Some("2024-01-01T01:00:00Z"));
        assert_eq!(comments[0].digest, comments[0].compute_digest());
    }
}
