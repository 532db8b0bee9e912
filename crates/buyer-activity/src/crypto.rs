//! AES-256-OFB with a zero IV — the result-decryption cipher.
//!
//! The zero IV is safe here only because `resultDecryptionKey` is minted
//! fresh per trade by the coordinator and never reused; the seller
//! encrypts with the same key and the same zero IV, so changing it would
//! silently break interoperability (see the design notes).

use std::io::{Read, Write};

use aes::Aes256;
use cipher::{KeyIvInit, StreamCipher};
use ofb::Ofb;

use buyer_primitives::{BuyError, Fingerprint};

type Aes256Ofb = Ofb<Aes256>;

const ZERO_IV: [u8; 16] = [0u8; 16];

fn cipher_for(key: Fingerprint) -> Aes256Ofb {
    Aes256Ofb::new(key.as_bytes().into(), &ZERO_IV.into())
}

/// Run `input` through AES-256-OFB under `key` with a zero IV, writing the
/// result to `output`. OFB XORs a keystream derived only from the key and
/// IV, so this single routine is its own inverse: it decrypts the seller's
/// ciphertext in the engine, and test fixtures use the exact same call to
/// produce ciphertext from known plaintext.
pub(crate) fn crypt_stream(
    key: Fingerprint,
    mut input: impl Read,
    mut output: impl Write,
) -> Result<(), BuyError> {
    let mut cipher = cipher_for(key);
    let mut buf = [0u8; 16 * 1024];
    loop {
        let n = input.read(&mut buf).map_err(|e| BuyError::CryptoError(e.to_string()))?;
        if n == 0 {
            break;
        }
        let chunk = &mut buf[..n];
        cipher.apply_keystream(chunk);
        output.write_all(chunk).map_err(|e| BuyError::CryptoError(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_reverses_encrypt_for_any_key_and_plaintext() {
        let key = Fingerprint::digest(b"single-use-result-key");
        let plaintext = b"the quick brown fox jumps over the lazy dog, many times over".to_vec();

        let mut ciphertext = Vec::new();
        crypt_stream(key, plaintext.as_slice(), &mut ciphertext).unwrap();
        assert_ne!(ciphertext, plaintext);
        assert_eq!(ciphertext.len(), plaintext.len());

        let mut decrypted = Vec::new();
        crypt_stream(key, ciphertext.as_slice(), &mut decrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn different_keys_produce_different_ciphertext() {
        let plaintext = b"identical plaintext".to_vec();
        let mut a = Vec::new();
        let mut b = Vec::new();
        crypt_stream(Fingerprint::digest(b"key-a"), plaintext.as_slice(), &mut a).unwrap();
        crypt_stream(Fingerprint::digest(b"key-b"), plaintext.as_slice(), &mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn handles_input_larger_than_the_internal_buffer() {
        let key = Fingerprint::digest(b"large-buffer-key");
        let plaintext: Vec<u8> = (0..100_000u32).map(|i| (i % 256) as u8).collect();

        let mut ciphertext = Vec::new();
        crypt_stream(key, plaintext.as_slice(), &mut ciphertext).unwrap();
        let mut decrypted = Vec::new();
        crypt_stream(key, ciphertext.as_slice(), &mut decrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }
}
