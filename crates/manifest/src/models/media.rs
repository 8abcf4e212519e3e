use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::hash::HashBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// One piece of media attached to a post.
///
/// Immutable once created. `source_url` is the origin URL as extracted and is
/// also the key the rehost cache is joined against at display time — the
/// manifest itself never stores owned-storage URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub kind: MediaKind,
    pub source_url: String,
    pub alt_text: String,
    pub width: u32,
    pub height: u32,
    /// `[latitude, longitude]`, carried over from archive imports with EXIF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl MediaItem {
    pub fn image(source_url: impl Into<String>, alt_text: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            kind: MediaKind::Image,
            source_url: source_url.into(),
            alt_text: alt_text.into(),
            width,
            height,
            geolocation: None,
            thumbnail_url: None,
        }
    }

    pub fn video(source_url: impl Into<String>, alt_text: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            kind: MediaKind::Video,
            source_url: source_url.into(),
            alt_text: alt_text.into(),
            width,
            height,
            geolocation: None,
            thumbnail_url: None,
        }
    }

    /// Fold this item's fields into a digest under construction, in the
    /// documented order: kind, source URL, alt text, width, height,
    /// geolocation (`"lat,lng"` or placeholder), thumbnail URL.
    pub(crate) fn hash_into(&self, builder: HashBuilder) -> HashBuilder {
        let geo = self.geolocation.map(|[lat, lng]| format!("{lat},{lng}"));
        builder
            .field(self.kind.to_string())
            .field(&self.source_url)
            .field(&self.alt_text)
            .field(self.width.to_string())
            .field(self.height.to_string())
            .optional(geo.as_deref())
            .optional(self.thumbnail_url.as_deref())
    }
}
