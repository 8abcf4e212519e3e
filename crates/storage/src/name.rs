//! Blob-name validation.

use crate::error::{ErrorKind, Result};

/// Validate a blob name before it reaches a backend.
///
/// Names are flat keys (slashes allowed for grouping) relative to the store
/// root. Rejected: empty names, absolute names, and any `.` / `..`
/// traversal component.
pub fn validate(name: &str) -> Result<&str> {
    let invalid = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if invalid {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    Ok(name)
}
