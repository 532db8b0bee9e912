//! The identity / signing subsystem, treated by the trade engine as an
//! opaque signer of byte strings.
//!
//! The coordinator and the seller both authenticate buyer requests by
//! verifying an ECDSA signature over the request body, so every outbound
//! message the transaction client or work-transfer protocol sends is
//! signed with [`Signer::sign`] before it leaves the process.

use k256::ecdsa::signature::Signer as _;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

/// Errors constructing or using a signer.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The stored private key bytes were not a valid scalar.
    #[error("invalid signing key: {0}")]
    InvalidKey(#[from] k256::ecdsa::Error),
    /// The hex-encoded key material was malformed.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// A signer of byte strings, identified by an opaque string handle (e.g. a
/// public key or account name known to the coordinator).
pub trait Signer: Send + Sync {
    /// The opaque identity string sent alongside every signed message.
    fn identity(&self) -> &str;

    /// Sign `message`, returning a hex-encoded signature.
    fn sign(&self, message: &[u8]) -> String;
}

/// An in-memory ECDSA (secp256k1) signer.
pub struct LocalSigner {
    identity: String,
    key: SigningKey,
}

impl LocalSigner {
    /// Generate a fresh signer with a random key, identified by `identity`.
    pub fn generate(identity: impl Into<String>, rng: &mut (impl rand::RngCore + rand::CryptoRng)) -> Self {
        Self {
            identity: identity.into(),
            key: SigningKey::random(rng),
        }
    }

    /// Load a signer from a hex-encoded 32-byte private key.
    pub fn from_hex(identity: impl Into<String>, hex_key: &str) -> Result<Self, IdentityError> {
        let bytes = hex::decode(hex_key)?;
        let key = SigningKey::from_slice(&bytes)?;
        Ok(Self {
            identity: identity.into(),
            key,
        })
    }

    /// The corresponding public key, for callers that need to publish it.
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.key.verifying_key()
    }
}

impl Signer for LocalSigner {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn sign(&self, message: &[u8]) -> String {
        let signature: Signature = self.key.sign(message);
        hex::encode(signature.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use k256::ecdsa::signature::Verifier;

    use super::*;

    #[test]
    fn signature_verifies_against_own_key() {
        let mut rng = rand::thread_rng();
        let signer = LocalSigner::generate("buyer-1", &mut rng);
        let message = b"EstablishBuyer:tx-42";

        let sig_hex = signer.sign(message);
        let sig_bytes = hex::decode(sig_hex).unwrap();
        let signature = Signature::from_slice(&sig_bytes).unwrap();

        assert!(signer.verifying_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn identity_round_trips_through_hex_key() {
        let mut rng = rand::thread_rng();
        let original = LocalSigner::generate("buyer-2", &mut rng);
        let hex_key = hex::encode(original.key.to_bytes());

        let reloaded = LocalSigner::from_hex("buyer-2", &hex_key).unwrap();
        assert_eq!(reloaded.sign(b"x"), original.sign(b"x"));
    }
}
