use sha2::{Digest, Sha256};

/// Hex characters kept from the digest. Short enough for a filename stem;
/// collisions within that prefix are accepted rather than detected.
const FINGERPRINT_LEN: usize = 12;

/// Maps a source URL to the identifier used as cache key and filename stem.
pub fn fingerprint(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..FINGERPRINT_LEN].to_string()
}
