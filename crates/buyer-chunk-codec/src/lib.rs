//! Content-addressed chunk synchronization codec.
//!
//! Computes chunk identifiers for a file via the external CAFS chunker and
//! stream-encodes/decodes a sync-info header, a wishlist bit vector, and the
//! body of selected chunks in a permuted order. See the module-level docs in
//! [`header`], [`wishlist`], [`permute`], and [`framing`] for the wire
//! details of each piece.

mod error;
mod framing;
mod header;
mod permute;
mod wishlist;

pub use error::ChunkCodecError;
pub use framing::{decode_into, encode_into};
pub use header::{decode_legacy, decode_modern, encode_legacy, encode_modern, legacy_entries_from, LegacyChunkEntry};
pub use permute::transmission_order;
pub use wishlist::{pack as pack_wishlist, unpack as unpack_wishlist};

use rand::seq::SliceRandom;

/// Generate a fresh uniform-random permutation of `[0, 256)`, used for
/// modern-mode transmission scrambling.
pub fn random_perm(rng: &mut impl rand::RngCore) -> [u8; buyer_primitives::PERM_SIZE] {
    let mut perm = buyer_primitives::identity_perm();
    perm.shuffle(rng);
    perm
}

#[cfg(test)]
mod tests {
    use buyer_primitives::{identity_perm, Fingerprint, SyncInfo};

    use super::*;

    #[test]
    fn legacy_and_modern_headers_agree_on_chunk_hashes() {
        let hashes = vec![Fingerprint::digest(b"x"), Fingerprint::digest(b"y")];
        let info = SyncInfo::legacy(hashes.clone());

        let modern = encode_modern(&info).unwrap();
        let decoded = decode_modern(&modern).unwrap();
        assert_eq!(decoded.chunk_hashes(), hashes.as_slice());
        assert!(decoded.is_legacy());

        let legacy_entries = legacy_entries_from(&info, &[10, 20]);
        let legacy_bytes = encode_legacy(&legacy_entries);
        let decoded_legacy = decode_legacy(&legacy_bytes).unwrap();
        assert_eq!(
            decoded_legacy.iter().map(|e| e.hash).collect::<Vec<_>>(),
            hashes
        );
    }

    #[test]
    fn legacy_mode_emission_order_matches_natural_order() {
        let hashes = vec![
            Fingerprint::digest(b"a"),
            Fingerprint::digest(b"b"),
            Fingerprint::digest(b"c"),
        ];
        let order = transmission_order(&hashes, &identity_perm());
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn random_perm_is_a_bijection() {
        let mut rng = rand::thread_rng();
        let perm = random_perm(&mut rng);
        assert!(buyer_primitives::is_bijection(&perm));
    }
}
