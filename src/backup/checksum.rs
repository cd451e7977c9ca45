//! Rolling payload checksum.
//!
//! Catches accidental corruption only; it offers no resistance to deliberate
//! tampering. The accumulation must stay bit-identical so that checksums of
//! existing snapshots keep verifying.

/// Compute `hash = (hash * 31 + byte) mod 2^32` over `bytes`, as 8 lowercase hex digits.
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    let hash = bytes
        .iter()
        .fold(0u32, |hash, &byte| hash.wrapping_mul(31).wrapping_add(u32::from(byte)));
    format!("{hash:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(checksum(b""), "00000000");
        assert_eq!(checksum(b"a"), "00000061");
        // 97 * 31 + 98
        assert_eq!(checksum(b"ab"), "00000c21");
    }

    #[test]
    fn test_wraps_at_u32() {
        let long = vec![0xffu8; 64];
        let expected = long
            .iter()
            .fold(0u64, |h, &b| (h * 31 + u64::from(b)) % (1u64 << 32));
        assert_eq!(checksum(&long), format!("{expected:08x}"));
    }

    #[test]
    fn test_single_byte_change_is_detected() {
        let original = br#"{"currentUser":{"id":1}}"#;
        let mut altered = original.to_vec();
        altered[18] = b'2';
        assert_ne!(checksum(original), checksum(&altered));
    }
}
