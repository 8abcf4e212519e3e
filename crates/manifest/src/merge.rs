//! Manifest merging.

use std::cmp::Reverse;
use std::collections::HashSet;

use tracing::instrument;

use crate::models::Manifest;
use crate::timestamp::parse_rfc3339;

/// Combine two manifests into one deduplicated, sorted, re-hashed manifest.
///
/// Posts are concatenated `a` then `b`, deduplicated by `id`, sorted by
/// `created_at` descending (newest first), and the result re-hashed. The
/// merged manifest keeps `a`'s `created_at`.
///
/// **Tie-break:** on `id` collision the post object from the *first* argument
/// is retained, even if the second argument's copy is fresher (more comments,
/// updated like count). Content-wise the merge is commutative; which
/// duplicate survives is not — pass the higher-priority source first.
#[instrument(skip_all, fields(a = a.posts.len(), b = b.posts.len()))]
pub fn merge_manifests(a: Manifest, b: Manifest) -> Manifest {
    let created_at = a.created_at.clone();
    let mut seen = HashSet::with_capacity(a.posts.len() + b.posts.len());
    let mut posts: Vec<_> = a
        .posts
        .into_iter()
        .chain(b.posts)
        .filter(|post| seen.insert(post.id.clone()))
        .collect();
    // Unparseable timestamps sort to the end rather than aborting the merge.
    posts.sort_by_cached_key(|post| Reverse(parse_rfc3339(&post.created_at)));

    let mut merged = Manifest {
        created_at,
        digest: String::new(),
        posts,
    };
    merged.rehash();
    merged
}
