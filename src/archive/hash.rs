//! Content hashing for archive merges.
//!
//! Hashing the serialized JSON of a record tells a replacing merge apart
//! from one that brought back identical content.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute a SHA256 hash of a serializable value.
///
/// # Panics
///
/// Panics if the value cannot be serialized to JSON. Archive records only
/// hold strings, booleans and string-keyed maps, so this does not happen.
#[must_use]
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).expect("serialization should not fail");
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}
