//! Archive-manifest normalization.
//!
//! Manifest fragments produced by the offline import tooling predate author
//! attribution and suffered a double-encoding pass on free text (the export
//! format Unicode-escaped the raw UTF-8 bytes, so multi-byte characters
//! arrive as runs of U+0080..U+00FF code points). Both are repaired here
//! before the fragment is merged with live content.

use tracing::{debug, instrument};

use crate::models::{Author, Manifest};

/// Backfill missing author metadata and repair double-encoded text on an
/// imported manifest fragment, recomputing digests for every mutated post.
///
/// Posts that already carry an author pass through untouched — attribution is
/// the marker that a post came from live extraction rather than the import
/// tooling, and live text never went through the escape pass.
#[instrument(skip_all, fields(posts = manifest.posts.len()))]
pub fn normalize_archive(manifest: &mut Manifest) {
    let mut touched = 0usize;
    for post in &mut manifest.posts {
        if post.author.is_some() {
            continue;
        }
        post.author = Some(Author::imported());
        if let Some(repaired) = repair_double_encoding(&post.text) {
            debug!(id = %post.id, "repaired double-encoded post text");
            post.text = repaired;
        }
        for item in &mut post.media {
            if let Some(repaired) = repair_double_encoding(&item.alt_text) {
                item.alt_text = repaired;
            }
        }
        post.rehash();
        touched += 1;
    }
    if touched > 0 {
        debug!(touched, "normalized imported posts");
        manifest.rehash();
    }
}

/// Undo a UTF-8-bytes-as-code-points encoding corruption.
///
/// Returns `Some(repaired)` only when every character fits in a single byte
/// *and* the byte-mapped form is valid UTF-8 that differs from the input.
/// Genuine single-byte text ("café") maps to invalid UTF-8 and is left alone.
pub(crate) fn repair_double_encoding(text: &str) -> Option<String> {
    if text.is_ascii() {
        return None;
    }
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let code_point = u32::from(ch);
        if code_point > 0xFF {
            return None;
        }
        bytes.push(code_point as u8);
    }
    match String::from_utf8(bytes) {
        Ok(repaired) if repaired != text => Some(repaired),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaItem, Post};

    fn imported_post(id: &str, text: &str) -> Post {
        let mut post = Post {
            id: id.to_string(),
            media: vec![MediaItem::image("https://cdn.example/a.jpg", "", 640, 480)],
            text: text.to_string(),
            created_at: "2020-05-01T00:00:00Z".to_string(),
            original_link: None,
            like_count: None,
            comments: None,
            author: None,
            digest: String::new(),
        };
        post.rehash();
        post
    }

    fn manifest(posts: Vec<Post>) -> Manifest {
        let mut manifest = Manifest {
            created_at: "2024-06-01T00:00:00Z".to_string(),
            digest: String::new(),
            posts,
        };
        manifest.rehash();
        manifest
    }

    // "🙂" (F0 9F 99 82) after the escape pass: one char per UTF-8 byte.
    const MANGLED_SMILEY: &str = "\u{f0}\u{9f}\u{99}\u{82}";

    #[test]
    fn test_repair_mangled_emoji() {
        assert_eq!(repair_double_encoding(MANGLED_SMILEY).as_deref(), Some("🙂"));
    }

    #[test]
    fn test_repair_leaves_genuine_text_alone() {
        assert_eq!(repair_double_encoding("plain ascii"), None);
        assert_eq!(repair_double_encoding("café au lait"), None);
        assert_eq!(repair_double_encoding("日本語"), None);
    }

    #[test]
    fn test_normalize_backfills_author_and_rehashes() {
        let post = imported_post("a", "beach day");
        let digest_before = post.digest.clone();
        let mut m = manifest(vec![post]);
        let manifest_digest_before = m.digest.clone();

        normalize_archive(&mut m);

        let post = &m.posts[0];
        assert!(post.author.as_ref().unwrap().is_imported());
        assert_ne!(post.digest, digest_before);
        assert_eq!(post.digest, post.compute_digest());
        assert_ne!(m.digest, manifest_digest_before);
        assert_eq!(m.digest, m.compute_digest());
    }

    #[test]
    fn test_normalize_repairs_text() {
        let mut m = manifest(vec![imported_post("a", MANGLED_SMILEY)]);
        normalize_archive(&mut m);
        assert_eq!(m.posts[0].text, "🙂");
    }

    #[test]
    fn test_normalize_skips_attributed_posts() {
        let mut post = imported_post("a", MANGLED_SMILEY);
        post.author = Some(Author::new("live.example", "Live", ""));
        post.rehash();
        let digest_before = post.digest.clone();

        let mut m = manifest(vec![post]);
        let manifest_digest_before = m.digest.clone();
        normalize_archive(&mut m);

        // Attributed posts are untouched, even if their text looks mangled.
        assert_eq!(m.posts[0].text, MANGLED_SMILEY);
        assert_eq!(m.posts[0].digest, digest_before);
        assert_eq!(m.digest, manifest_digest_before);
    }
}
