//! Content hashing for deterministic identifiers.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of raw bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash an ordered list of fields.
///
/// Each field is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn fields_hash<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for field in fields {
        let field = field.as_ref();
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}
