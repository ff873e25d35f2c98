//! BLAKE3-based key derivation for cache entries and engine result keys.

use blake3::Hasher;

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Keys index caches only; collisions at this width merge two requests into one entry.
/// Birthday probability at n entries is about `n² / 2^65`.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

/// Hashes ordered parts with a `|` separator so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn hash_parts<S: AsRef<str>>(parts: &[S]) -> u64 {
    let mut hasher = Hasher::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_ref().as_bytes());
    }
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

/// Hex form of [`hash_parts`], suitable as a string cache key.
#[inline]
pub fn hash_parts_hex<S: AsRef<str>>(parts: &[S]) -> String {
    format!("{:016x}", hash_parts(parts))
}
