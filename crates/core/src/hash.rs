//! Hashing utilities for business keys

use seahash::SeaHasher;
use std::hash::Hasher;

/// Hash a composite key. Each component is length-prefixed and null is
/// tagged separately, so `("ab", "c")`, `("a", "bc")` and `(None, "")` differ.
pub fn hash_key<S: AsRef<str>>(components: &[Option<S>]) -> u64 {
    let mut hasher = SeaHasher::new();
    for component in components {
        match component {
            Some(s) => {
                let bytes = s.as_ref().as_bytes();
                hasher.write_u8(1);
                hasher.write_u64(bytes.len() as u64);
                hasher.write(bytes);
            }
            None => hasher.write_u8(0),
        }
    }
    hasher.finish()
}
