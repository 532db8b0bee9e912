//! The [`WorkFile`] trait: the buyer engine's view of a content-addressed
//! blob, as provided by the content-addressable file store (CAFS).
//!
//! CAFS itself is an external collaborator (see the crate-level docs); this
//! trait is the narrow boundary the trade engine actually depends on.

use std::io::{self, Read};

use bytes::Bytes;

use crate::Fingerprint;

/// One chunk of a [`WorkFile`], as yielded by [`WorkFile::chunks`].
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Position of the chunk within the file, in emission order.
    pub index: usize,
    /// Content fingerprint of this chunk alone.
    pub hash: Fingerprint,
    /// The chunk's bytes.
    pub data: Bytes,
}

/// An opaque, content-addressed handle to a work or result blob.
///
/// Handles carry ownership: every handle returned by [`WorkFile::duplicate`]
/// (and every handle a CAFS implementation hands out originally) must
/// eventually be released by dropping it. Implementations that back onto
/// real file descriptors or temp files should do that cleanup in `Drop`.
pub trait WorkFile: Send + Sync {
    /// Open a fresh byte stream over the whole file, from the start.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;

    /// The content key of the whole file.
    fn key(&self) -> Fingerprint;

    /// Whether the file has been sliced into chunks by the CAFS chunker.
    fn is_chunked(&self) -> bool;

    /// Number of chunks, or `0` if [`WorkFile::is_chunked`] is false.
    fn num_chunks(&self) -> usize;

    /// A restartable, lazy sequence over this file's chunks in natural
    /// (on-disk) order. Calling this twice yields two independent iterators
    /// reading from the start.
    fn chunks(&self) -> Box<dyn Iterator<Item = io::Result<ChunkRecord>> + Send>;

    /// Total size of the file in bytes.
    fn size(&self) -> u64;

    /// Create an independent, owning handle to the same content. The
    /// original and the duplicate must each be released independently.
    fn duplicate(&self) -> Box<dyn WorkFile>;
}

/// A sink CAFS hands out for building new content-addressed blobs (e.g. the
/// decrypted result file). Implementations finalize into a real [`WorkFile`]
/// on [`TempSink::finish`]; dropping without finishing discards the temp.
pub trait TempSink: io::Write + Send {
    /// Finalize the sink into an owned [`WorkFile`] handle, keyed by the
    /// content written so far.
    fn finish(self: Box<Self>) -> io::Result<Box<dyn WorkFile>>;
}

/// The narrow slice of the content-addressable file store that the work
/// transfer and activity state machine need directly: a place to sink the
/// encrypted result and, later, the decrypted plaintext. Everything else
/// CAFS provides (import, lookup) is a concern of the CLI/scheduler that
/// hands a [`WorkFile`] to the engine in the first place.
pub trait Cafs: Send + Sync {
    /// Create a new temp sink for writing content whose key is not yet
    /// known.
    fn create_temp(&self) -> io::Result<Box<dyn TempSink>>;
}
