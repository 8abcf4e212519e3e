use serde::{Deserialize, Serialize};

use crate::hash::HashBuilder;
use crate::models::Author;

/// A direct reply to an archived post.
///
/// Immutable once hashed: any field change requires calling [`rehash`](Self::rehash)
/// before the comment (or its parent post) is compared or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub author: Author,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Digest over all other fields. Parent posts fold this value in as an
    /// opaque string rather than re-hashing comment content.
    #[serde(rename = "hash", default)]
    pub digest: String,
}

impl Comment {
    pub fn new(
        author: Author,
        text: impl Into<String>,
        original_link: Option<String>,
        created_at: Option<String>,
    ) -> Self {
        let mut comment = Self {
            author,
            text: text.into(),
            original_link,
            created_at,
            digest: String::new(),
        };
        comment.rehash();
        comment
    }

    /// Digest field order: author (handle, display name, avatar URL), text,
    /// original link, created-at. Absent optionals submit placeholders.
    pub fn compute_digest(&self) -> String {
        self.author
            .hash_into(HashBuilder::new())
            .field(&self.text)
            .optional(self.original_link.as_deref())
            .optional(self.created_at.as_deref())
            .finish()
    }

    /// Recompute and store this comment's digest.
    pub fn rehash(&mut self) {
        self.digest = self.compute_digest();
    }
}
