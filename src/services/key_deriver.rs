//! Storage key derivation.
//!
//! Keys have the shape `{scope}/{directory_path}/{renamed_filename}` where the
//! scope comes from [`AuthenticatedCaller::scope`] and the filename is replaced
//! by a random token. The directory path is concatenated verbatim.

use crate::models::caller::AuthenticatedCaller;
use uuid::Uuid;

/// Longest extension carried over from the client's filename.
const MAX_EXTENSION_LEN: usize = 16;

/// Derive the storage key for one upload.
///
/// Safe to call concurrently: uniqueness comes from a v4 UUID, not a counter.
pub fn derive(caller: &AuthenticatedCaller, directory_path: &str, original_filename: &str) -> String {
    format!(
        "{}/{}/{}",
        caller.scope(),
        directory_path,
        rename(original_filename)
    )
}

/// Replace the filename stem with a fresh token, keeping the extension.
///
/// Only a short alphanumeric extension survives, so nothing from the client's
/// filename can introduce separators into the key.
pub fn rename(original_filename: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    match extension(original_filename) {
        Some(ext) => format!("{}.{}", token, ext),
        None => token,
    }
}

fn extension(filename: &str) -> Option<&str> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || stem.ends_with('/') || stem.ends_with('\\') {
        return None;
    }
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then_some(ext)
}

/// Directory id recorded on metadata: everything after the last `/`, the
/// whole path when it has no separator, `None` only when the path is empty.
/// A trailing separator therefore yields an empty id.
pub fn directory_id(directory_path: &str) -> Option<String> {
    if directory_path.is_empty() {
        return None;
    }
    let segment = match directory_path.rsplit_once('/') {
        Some((_, last)) => last,
        None => directory_path,
    };
    Some(segment.to_string())
}
