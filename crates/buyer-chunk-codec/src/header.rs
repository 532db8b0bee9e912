//! Encoding and decoding of sync-info headers.
//!
//! Two interchangeable wire forms exist: the legacy binary form (no
//! permutation, implicitly identity-ordered) and the modern JSON form
//! (carries an explicit 256-bucket permutation).

use buyer_primitives::{Fingerprint, SyncInfo, PERM_SIZE};
use serde::{Deserialize, Serialize};
use unsigned_varint::{decode as varint_decode, encode as varint_encode};

use crate::error::ChunkCodecError;

/// A chunk hash paired with its on-disk byte length, as carried by the
/// legacy header (which has no separate length table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyChunkEntry {
    /// Content hash of the chunk.
    pub hash: Fingerprint,
    /// Length of the chunk, in bytes.
    pub length: u64,
}

/// Encode chunk hash/length pairs as a legacy binary header: a flat
/// concatenation of `{hash: 32B}{length: uvarint}` records.
pub fn encode_legacy(entries: &[LegacyChunkEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * 33);
    let mut len_buf = varint_encode::u64_buffer();
    for entry in entries {
        out.extend_from_slice(entry.hash.as_bytes());
        out.extend_from_slice(varint_encode::u64(entry.length, &mut len_buf));
    }
    out
}

/// Decode a legacy binary header into its chunk hash/length pairs.
pub fn decode_legacy(mut bytes: &[u8]) -> Result<Vec<LegacyChunkEntry>, ChunkCodecError> {
    let mut entries = Vec::new();
    while !bytes.is_empty() {
        if bytes.len() < buyer_primitives::FINGERPRINT_SIZE {
            return Err(ChunkCodecError::MalformedLegacyHeader(
                "truncated hash field".to_string(),
            ));
        }
        let (hash_bytes, rest) = bytes.split_at(buyer_primitives::FINGERPRINT_SIZE);
        let hash = Fingerprint::from_slice(hash_bytes)
            .map_err(|e| ChunkCodecError::MalformedLegacyHeader(e.to_string()))?;
        let (length, rest) = varint_decode::u64(rest)
            .map_err(|e| ChunkCodecError::MalformedLegacyHeader(e.to_string()))?;
        entries.push(LegacyChunkEntry { hash, length });
        bytes = rest;
    }
    Ok(entries)
}

/// Wire shape of the modern JSON sync-info header.
#[derive(Debug, Serialize, Deserialize)]
struct SyncInfoJson {
    #[serde(rename = "chunkHashes")]
    chunk_hashes: Vec<String>,
    perm: Vec<u8>,
}

/// Encode a [`SyncInfo`] as the modern JSON header.
pub fn encode_modern(info: &SyncInfo) -> Result<Vec<u8>, ChunkCodecError> {
    let json = SyncInfoJson {
        chunk_hashes: info.chunk_hashes().iter().map(|h| h.to_hex()).collect(),
        perm: info.perm().to_vec(),
    };
    Ok(serde_json::to_vec(&json)?)
}

/// Decode the modern JSON header into a [`SyncInfo`].
pub fn decode_modern(bytes: &[u8]) -> Result<SyncInfo, ChunkCodecError> {
    let json: SyncInfoJson = serde_json::from_slice(bytes)?;
    let chunk_hashes = json
        .chunk_hashes
        .iter()
        .map(|s| s.parse::<Fingerprint>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ChunkCodecError::MalformedJson(serde::de::Error::custom(e.to_string())))?;
    if json.perm.len() != PERM_SIZE {
        return Err(ChunkCodecError::SyncInfo(
            buyer_primitives::SyncInfoError::WrongPermLength(json.perm.len()),
        ));
    }
    let mut perm = [0u8; PERM_SIZE];
    perm.copy_from_slice(&json.perm);
    Ok(SyncInfo::new(chunk_hashes, perm)?)
}

/// Build a legacy header from a [`SyncInfo`] and matching chunk lengths.
/// `lengths` must be the same length as `info.chunk_hashes()`.
pub fn legacy_entries_from(info: &SyncInfo, lengths: &[u64]) -> Vec<LegacyChunkEntry> {
    info.chunk_hashes()
        .iter()
        .zip(lengths.iter())
        .map(|(hash, &length)| LegacyChunkEntry {
            hash: hash.clone(),
            length,
        })
        .collect()
}
