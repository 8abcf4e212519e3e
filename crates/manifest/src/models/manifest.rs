use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Result;
use crate::hash::HashBuilder;
use crate::models::Post;
use crate::timestamp::{now_rfc3339, parse_rfc3339};

/// The top-level persisted collection of archived posts.
///
/// Invariant: `digest` always reflects the current `posts` content. Any
/// mutation of the post list must be followed by [`rehash`](Self::rehash)
/// before the manifest is compared for equality — digest comparison is the
/// sole conflict-detection mechanism in the whole system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// RFC 3339 timestamp of the extraction run that produced this manifest.
    pub created_at: String,
    #[serde(rename = "hash", default)]
    pub digest: String,
    pub posts: Vec<Post>,
}

impl Manifest {
    /// A freshly hashed manifest stamped with the current time.
    pub fn new(posts: Vec<Post>) -> Result<Self> {
        let mut manifest = Self {
            created_at: now_rfc3339()?,
            digest: String::new(),
            posts,
        };
        manifest.rehash();
        Ok(manifest)
    }

    /// An empty manifest, used when nothing has been persisted yet.
    pub fn empty() -> Result<Self> {
        Self::new(Vec::new())
    }

    /// Digest field order: created-at, then each post digest in order.
    ///
    /// Post digests are opaque strings here; the manifest digest is
    /// proportional to the number of posts, not the size of their content.
    pub fn compute_digest(&self) -> String {
        let mut builder = HashBuilder::new().field(&self.created_at);
        for post in &self.posts {
            builder = builder.field(&post.digest);
        }
        builder.finish()
    }

    /// Recompute and store the manifest digest. Assumes post digests are
    /// already current.
    pub fn rehash(&mut self) {
        self.digest = self.compute_digest();
    }

    /// The creation instant of the newest post, used as the incremental
    /// extraction cutoff. Posts with unparseable timestamps are ignored.
    pub fn newest_post_time(&self) -> Option<OffsetDateTime> {
        self.posts.iter().filter_map(|post| parse_rfc3339(&post.created_at)).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaItem;

    fn post(id: &str, created_at: &str) -> Post {
        let mut post = Post {
            id: id.to_string(),
            media: vec![MediaItem::image("https://cdn.example/a.jpg", "", 640, 480)],
            text: "hello".to_string(),
            created_at: created_at.to_string(),
            original_link: None,
            like_count: None,
            comments: None,
            author: None,
            digest: String::new(),
        };
        post.rehash();
        post
    }

    #[test]
    fn test_digest_reflects_post_list() {
        let mut manifest = Manifest::new(vec![post("a", "2024-01-02T00:00:00Z")]).unwrap();
        let before = manifest.digest.clone();
        manifest.posts.push(post("b", "2024-01-01T00:00:00Z"));
        manifest.rehash();
        assert_ne!(manifest.digest, before);
    }

    #[test]
    fn test_newest_post_time_ignores_order() {
        let manifest = Manifest::new(vec![
            post("old", "2024-01-01T00:00:00Z"),
            post("new", "2024-03-01T00:00:00Z"),
            post("mid", "2024-02-01T00:00:00Z"),
        ])
        .unwrap();
        let newest = manifest.newest_post_time().unwrap();
        assert_eq!(newest, parse_rfc3339("2024-03-01T00:00:00Z").unwrap());
    }

    #[test]
    fn test_newest_post_time_empty() {
        assert!(Manifest::empty().unwrap().newest_post_time().is_none());
    }

    #[test]
    fn test_serde_roundtrip_preserves_digest() {
        let manifest = Manifest::new(vec![post("a", "2024-01-02T00:00:00Z")]).unwrap();
        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
        assert_eq!(back.digest, back.compute_digest());
    }
}
