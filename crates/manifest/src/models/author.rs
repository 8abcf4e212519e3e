use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::hash::HashBuilder;

/// Sentinel handle stamped onto posts that arrived through an offline archive
/// import, which predates author attribution.
pub const IMPORTED_HANDLE: &str = "archive.import";

/// Attribution for a post or comment.
///
/// A value type: embedded wherever attribution is needed rather than shared
/// by reference, so a post and its comments each own their copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub handle: String,
    pub display_name: String,
    pub avatar_url: String,
}

impl Author {
    pub fn new(
        handle: impl Into<String>,
        display_name: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            handle: handle.into(),
            display_name: display_name.into(),
            avatar_url: avatar_url.into(),
        }
    }

    /// The fixed identity representing imported content (see
    /// [`normalize_archive`](crate::normalize_archive)).
    pub fn imported() -> Self {
        Self::new(IMPORTED_HANDLE, "Imported Archive", "")
    }

    /// Returns `true` for the sentinel imported-content identity.
    pub fn is_imported(&self) -> bool {
        self.handle == IMPORTED_HANDLE
    }

    /// Fold this author's fields into a digest under construction, in the
    /// documented order: handle, display name, avatar URL.
    pub(crate) fn hash_into(&self, builder: HashBuilder) -> HashBuilder {
        builder.field(&self.handle).field(&self.display_name).field(&self.avatar_url)
    }

    /// Fold an *optional* author into a digest under construction. An absent
    /// author submits three empty-string placeholders so that `None` and a
    /// skipped submission never collide (see [`crate::hash`]).
    pub(crate) fn hash_optional_into(author: Option<&Self>, builder: HashBuilder) -> HashBuilder {
        match author {
            Some(author) => author.hash_into(builder),
            None => builder.field("").field("").field(""),
        }
    }
}

impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.display_name.is_empty() {
            write!(f, "@{}", self.handle)
        } else {
            write!(f, "{} (@{})", self.display_name, self.handle)
        }
    }
}
