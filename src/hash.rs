//! Content hashing for net-index validation.
//!
//! An order-sensitive FNV-1a chain over the finalized tag sequence lets two
//! independently built registries detect divergence: equal hashes guarantee
//! both ends assigned identical indices to identical tags.

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a 64-bit hash — simple, fast, const-compatible.
pub const fn fnv1a_64(bytes: &[u8]) -> u64 {
    fnv1a_64_continue(FNV_OFFSET, bytes)
}

/// Continue an FNV-1a hash from a previous state.
pub const fn fnv1a_64_continue(state: u64, bytes: &[u8]) -> u64 {
    let mut hash = state;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Hash an ordered sequence of strings.
///
/// Each element is terminated with a byte that cannot occur in UTF-8 text so
/// `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn sequence_hash<'a, I>(items: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hash = FNV_OFFSET;
    for item in items {
        hash = fnv1a_64_continue(hash, item.as_bytes());
        hash = fnv1a_64_continue(hash, &[0xFF]);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv_basic_sanity() {
        assert_ne!(fnv1a_64(b"hello"), fnv1a_64(b"world"));
        assert_eq!(fnv1a_64(b"hello"), fnv1a_64(b"hello"));
    }

    #[test]
    fn sequence_hash_is_order_sensitive() {
        let ab = sequence_hash(["a", "b"]);
        let ba = sequence_hash(["b", "a"]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn sequence_hash_respects_element_boundaries() {
        assert_ne!(sequence_hash(["ab", "c"]), sequence_hash(["a", "bc"]));
        assert_ne!(sequence_hash(["abc"]), sequence_hash(["ab", "c"]));
    }

    #[test]
    fn sequence_hash_is_reproducible() {
        let paths = ["combat", "combat.melee", "combat.melee.sword"];
        assert_eq!(sequence_hash(paths), sequence_hash(paths));
    }

    #[test]
    fn empty_sequence_has_stable_hash() {
        let empty = || sequence_hash(std::iter::empty::<&str>());
        assert_eq!(empty(), empty());
        assert_ne!(empty(), sequence_hash([""]));
    }
}
