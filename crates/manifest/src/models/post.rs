use serde::{Deserialize, Serialize};

use crate::hash::HashBuilder;
use crate::models::{Author, Comment, MediaItem};

/// An archived post.
///
/// `id` is the stable external identifier (the content identifier of the
/// origin item) and is the natural key for deduplication across merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub media: Vec<MediaItem>,
    pub text: String,
    /// RFC 3339 / ISO-8601.
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
    /// Absent on posts that came from an offline import; backfilled by
    /// [`normalize_archive`](crate::normalize_archive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    /// Digest over every field, with nested comments contributing their
    /// digests rather than their raw content.
    #[serde(rename = "hash", default)]
    pub digest: String,
}

impl Post {
    /// Digest field order: id, text, created-at, original link, like count,
    /// author (three placeholder fields when absent), each media item's
    /// fields in order, each comment digest in order.
    ///
    /// Comment digests are folded in as opaque strings — a comment edit
    /// propagates upward by rehashing the comment and then the post, without
    /// the post digesting comment internals a second time.
    pub fn compute_digest(&self) -> String {
        let mut builder = HashBuilder::new()
            .field(&self.id)
            .field(&self.text)
            .field(&self.created_at)
            .optional(self.original_link.as_deref())
            .optional(self.like_count.map(|n| n.to_string()).as_deref());
        builder = Author::hash_optional_into(self.author.as_ref(), builder);
        for item in &self.media {
            builder = item.hash_into(builder);
        }
        for comment in self.comments.iter().flatten() {
            builder = builder.field(&comment.digest);
        }
        builder.finish()
    }

    /// Recompute and store this post's digest. Assumes nested comment
    /// digests are already current.
    pub fn rehash(&mut self) {
        self.digest = self.compute_digest();
    }
}
