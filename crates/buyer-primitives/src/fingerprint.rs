//! 256-bit content fingerprints.
//!
//! A [`Fingerprint`] is the SHA-256 digest used throughout the trade engine as
//! a work key, a shared secret, or a hash-of-hash. It carries no semantic
//! meaning beyond "32 bytes produced by SHA-256" — callers decide what it
//! identifies.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// Number of bytes in a fingerprint.
pub const FINGERPRINT_SIZE: usize = 32;

/// A 256-bit opaque fingerprint (SHA-256 digest).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; FINGERPRINT_SIZE]);

/// Errors produced while parsing or validating a [`Fingerprint`].
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// The input did not decode to exactly [`FINGERPRINT_SIZE`] bytes.
    #[error("invalid fingerprint length: expected {FINGERPRINT_SIZE}, got {0}")]
    InvalidLength(usize),
    /// The input was not valid hex.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl Fingerprint {
    /// Wrap a raw 32-byte digest.
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a fingerprint from a byte slice, failing if the length is wrong.
    pub fn from_slice(slice: &[u8]) -> Result<Self, FingerprintError> {
        if slice.len() != FINGERPRINT_SIZE {
            return Err(FingerprintError::InvalidLength(slice.len()));
        }
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Hash arbitrary bytes into a fingerprint.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Hash the concatenation of several byte slices (used for
    /// `workSecretHash = SHA256(workHash ‖ buyerSecret)`-style derivations).
    pub fn digest_concat(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    /// Copy out the raw bytes.
    pub fn to_bytes(self) -> [u8; FINGERPRINT_SIZE] {
        self.0
    }

    /// The high byte of the digest, used by the chunk codec to bucket chunks
    /// by permutation.
    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Generate a random fingerprint using the provided RNG (used for the
    /// per-buy `buyerSecret`).
    pub fn random(rng: &mut impl rand::RngCore) -> Self {
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl From<[u8; FINGERPRINT_SIZE]> for Fingerprint {
    fn from(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let fp = Fingerprint::digest(b"hello world");
        let s = fp.to_hex();
        let parsed: Fingerprint = s.parse().unwrap();
        assert_eq!(fp, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Fingerprint::from_slice(&[0u8; 31]).unwrap_err();
        assert!(matches!(err, FingerprintError::InvalidLength(31)));
    }

    #[test]
    fn digest_concat_matches_manual_concat() {
        let a = Fingerprint::digest(b"work");
        let b = Fingerprint::digest(b"secret");
        let combined = Fingerprint::digest_concat(&[a.as_ref(), b.as_ref()]);
        let mut manual = Vec::new();
        manual.extend_from_slice(a.as_ref());
        manual.extend_from_slice(b.as_ref());
        assert_eq!(combined, Fingerprint::digest(&manual));
    }
}
