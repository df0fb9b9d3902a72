//! Request cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key identifying a request inside a bucket.
///
/// The method is uppercased; the URL is expected to be canonical already
/// (fragment stripped) since `#a` and `#b` address the same resource.
pub fn request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
