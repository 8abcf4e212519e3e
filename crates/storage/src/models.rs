/// Metadata for one stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// Name the blob was stored under (flat key, may contain `/`).
    pub name: String,
    /// Publicly reachable URL.
    pub url: String,
    /// Size in bytes.
    pub size: u64,
}
