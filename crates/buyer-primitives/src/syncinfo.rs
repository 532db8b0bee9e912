//! [`SyncInfo`]: the header describing a work file as an ordered list of
//! chunk hashes plus a 256-bucket permutation used to scramble transmission
//! order (see the chunk codec crate for the wire encodings).

use crate::Fingerprint;

/// Number of buckets in a transmission permutation (one per possible high
/// byte of a chunk hash).
pub const PERM_SIZE: usize = 256;

/// Errors constructing or validating a [`SyncInfo`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyncInfoError {
    /// `perm` was not a bijection on `[0, 256)`.
    #[error("permutation is not a bijection on [0, 256)")]
    NotABijection,
    /// `perm` did not contain exactly 256 entries.
    #[error("permutation must have exactly {PERM_SIZE} entries, got {0}")]
    WrongPermLength(usize),
}

/// Header describing a work file as a sequence of chunks, in the order they
/// will be transmitted once permuted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncInfo {
    /// Per-chunk content hashes, in natural (on-disk) order.
    chunk_hashes: Vec<Fingerprint>,
    /// Bucket permutation of `[0, 256)`. The identity permutation marks
    /// legacy mode.
    perm: [u8; PERM_SIZE],
}

impl SyncInfo {
    /// Build a `SyncInfo`, validating that `perm` is a bijection.
    pub fn new(chunk_hashes: Vec<Fingerprint>, perm: [u8; PERM_SIZE]) -> Result<Self, SyncInfoError> {
        if !is_bijection(&perm) {
            return Err(SyncInfoError::NotABijection);
        }
        Ok(Self { chunk_hashes, perm })
    }

    /// Build a `SyncInfo` in legacy mode (identity permutation).
    pub fn legacy(chunk_hashes: Vec<Fingerprint>) -> Self {
        Self {
            chunk_hashes,
            perm: identity_perm(),
        }
    }

    /// The ordered chunk hashes.
    pub fn chunk_hashes(&self) -> &[Fingerprint] {
        &self.chunk_hashes
    }

    /// The bucket permutation.
    pub fn perm(&self) -> &[u8; PERM_SIZE] {
        &self.perm
    }

    /// Number of chunks described.
    pub fn num_chunks(&self) -> usize {
        self.chunk_hashes.len()
    }

    /// Whether `perm` is the identity permutation, marking legacy mode.
    pub fn is_legacy(&self) -> bool {
        self.perm == identity_perm()
    }

    /// A short fingerprint over this `SyncInfo`, used by the assistive
    /// ticket registry to decide whether two synchronizations are "about
    /// the same work".
    pub fn handprint(&self) -> Fingerprint {
        let mut buf = Vec::with_capacity(self.chunk_hashes.len() * 32 + PERM_SIZE);
        for hash in &self.chunk_hashes {
            buf.extend_from_slice(hash.as_ref());
        }
        buf.extend_from_slice(&self.perm);
        Fingerprint::digest(&buf)
    }
}

/// The identity permutation: `perm[i] == i` for all `i`.
pub fn identity_perm() -> [u8; PERM_SIZE] {
    let mut perm = [0u8; PERM_SIZE];
    for (i, slot) in perm.iter_mut().enumerate() {
        *slot = i as u8;
    }
    perm
}

/// Check that `perm` is a bijection on `[0, 256)`, i.e. every value in
/// `0..256` appears exactly once.
pub fn is_bijection(perm: &[u8; PERM_SIZE]) -> bool {
    let mut seen = [false; PERM_SIZE];
    for &value in perm {
        let slot = &mut seen[value as usize];
        if *slot {
            return false;
        }
        *slot = true;
    }
    true
}
