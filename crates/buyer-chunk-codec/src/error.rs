use std::io;

/// Failures encoding or decoding sync-info headers, wishlists, and chunk
/// bodies.
#[derive(Debug, thiserror::Error)]
pub enum ChunkCodecError {
    /// Legacy binary header was truncated or malformed.
    #[error("malformed legacy header: {0}")]
    MalformedLegacyHeader(String),
    /// Modern JSON header failed to parse or validate.
    #[error("malformed sync-info json: {0}")]
    MalformedJson(#[from] serde_json::Error),
    /// `perm` was present but not a bijection on `[0, 256)`.
    #[error(transparent)]
    SyncInfo(#[from] buyer_primitives::SyncInfoError),
    /// A uvarint length prefix could not be read.
    #[error("malformed length prefix: {0}")]
    MalformedLength(String),
    /// I/O failure reading from the source or writing to the sink.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
