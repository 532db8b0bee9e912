//! A reference content-addressable file store (CAFS): the buyer engine
//! treats CAFS as an opaque collaborator providing chunked files, content
//! keys, streaming reads, and temporary sinks (see
//! [`buyer_primitives::WorkFile`] and [`buyer_primitives::TempSink`]). This
//! crate is one concrete, filesystem-backed implementation of that
//! contract, used by the CLI and by tests.

mod chunker;
mod store;
mod workfile;

pub use chunker::chunk_boundaries;
pub use store::CafsStore;
pub use workfile::{FsTempSink, FsWorkFile};
