//! Deterministic string hashing for hash-mode routing
//!
//! Non-cryptographic: the only requirement is that the same key always lands
//! in the same weight bucket, so the hash must be stable across processes
//! and platforms.

/// 32-bit rolling multiply-add hash (`h = h * 31 + c`), absolute value.
///
/// Operates on UTF-16 code units so multi-byte input hashes consistently
/// with the gateway's JavaScript-era keys.
pub fn simple_hash(input: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    hash.unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = simple_hash("vk-1234567890");
        let b = simple_hash("vk-1234567890");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_differs_for_different_keys() {
        assert_ne!(simple_hash("vk-alpha"), simple_hash("vk-beta"));
    }

    #[test]
    fn test_empty_string_hashes_to_zero() {
        assert_eq!(simple_hash(""), 0);
    }

    #[test]
    fn test_hash_handles_non_ascii() {
        // Must not panic and must stay deterministic across calls
        let key = "键-🔑-ключ";
        assert_eq!(simple_hash(key), simple_hash(key));
    }

    #[test]
    fn test_single_char_matches_code_unit() {
        // h = 0*31 + 'a' = 97
        assert_eq!(simple_hash("a"), 97);
    }
}
