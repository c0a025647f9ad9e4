//! Content fingerprinting.
//!
//! A fingerprint is the XXH64 (seed 0) digest of the raw upload bytes. It is a
//! non-cryptographic identity: two uploads are "the same image" exactly when
//! their fingerprints are equal.

use std::fmt;

use xxhash_rust::xxh64::xxh64;

const SEED: u64 = 0;

/// 64-bit content identity of an uploaded byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Key under which this fingerprint is stored.
    ///
    /// Lowercase hex without zero padding, so keys written by earlier
    /// deployments of the service still match.
    pub fn to_key(self) -> String {
        format!("{:x}", self.0)
    }
}

impl From<u64> for Fingerprint {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Compute the fingerprint of `bytes`. Pure and infallible.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    Fingerprint(xxh64(bytes, SEED))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_bytes_same_fingerprint() {
        let data = b"\xFF\xD8\xFF\xE0 not really a jpeg";
        assert_eq!(fingerprint(data), fingerprint(data));
        assert_eq!(fingerprint(data), fingerprint(&data.to_vec()));
    }

    #[test]
    fn test_different_bytes_different_fingerprint() {
        assert_ne!(fingerprint(b"image-a"), fingerprint(b"image-b"));
        // single flipped bit
        assert_ne!(fingerprint(&[0b0000_0000]), fingerprint(&[0b0000_0001]));
    }

    #[test]
    fn test_empty_input_is_defined() {
        // XXH64 of the empty input with seed 0
        assert_eq!(fingerprint(b"").as_u64(), 0xef46_db37_51d8_e999);
    }

    #[test]
    fn test_key_is_unpadded_lowercase_hex() {
        assert_eq!(Fingerprint::from(0xABCu64).to_key(), "abc");
        assert_eq!(Fingerprint::from(0u64).to_key(), "0");
        assert_eq!(
            Fingerprint::from(u64::MAX).to_key(),
            "ffffffffffffffff"
        );
    }

    #[test]
    fn test_display_matches_key() {
        let fp = fingerprint(b"hello world");
        assert_eq!(fp.to_string(), fp.to_key());
    }
}
