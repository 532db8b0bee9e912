//! Transmission-order permutation.
//!
//! Chunks are bucketed by `perm[hash[0]]`, then emitted in natural-index
//! order within a bucket. With `perm` the identity, this reduces to natural
//! order, which is what the legacy (unpermuted) wire form always uses.

use buyer_primitives::{Fingerprint, PERM_SIZE};

/// Compute the emission order for a list of chunk hashes under `perm`:
/// indices into `chunk_hashes`, sorted by `(perm[hash[0]], natural index)`.
pub fn transmission_order(chunk_hashes: &[Fingerprint], perm: &[u8; PERM_SIZE]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..chunk_hashes.len()).collect();
    order.sort_by_key(|&i| {
        let hash = chunk_hashes
            .get(i)
            .expect("index drawn from chunk_hashes.len()");
        (perm[hash.first_byte() as usize], i)
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_perm_is_natural_order() {
        let hashes = vec![
            Fingerprint::digest(b"a"),
            Fingerprint::digest(b"b"),
            Fingerprint::digest(b"c"),
        ];
        let order = transmission_order(&hashes, &buyer_primitives::identity_perm());
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn scrambles_by_first_byte_bucket() {
        // Two hashes whose first byte we pin directly via from_bytes.
        let mut a = [0u8; 32];
        a[0] = 5;
        let mut b = [0u8; 32];
        b[0] = 1;
        let hashes = vec![Fingerprint::from_bytes(a), Fingerprint::from_bytes(b)];

        let mut perm = buyer_primitives::identity_perm();
        // Put bucket 5 before bucket 1.
        perm.swap(5, 1);
        // perm[5] == 1, perm[1] == 5 now: hash `a` (first_byte=5) maps to
        // bucket perm[5]=1, hash `b` (first_byte=1) maps to bucket
        // perm[1]=5, so `a` (bucket 1) now sorts before `b` (bucket 5).
        let order = transmission_order(&hashes, &perm);
        assert_eq!(order, vec![0, 1]);
    }
}
