//! Shared data types for the buyer-side trade engine: fingerprints, the
//! work file abstraction, sync headers, transaction snapshots, assistive
//! ticket bookkeeping, and the buy activity record.
//!
//! This crate is deliberately inert: it defines shapes and small pure
//! helpers, not I/O or locking. Every other `buyer-*` crate depends on it.

mod activity;
mod assist;
mod fingerprint;
mod syncinfo;
mod tx;
mod workfile;

pub use activity::{BuyActivityState, BuyError, TransferProgress};
pub use assist::AssistiveTicketNode;
pub use fingerprint::{Fingerprint, FingerprintError, FINGERPRINT_SIZE};
pub use syncinfo::{identity_perm, is_bijection, SyncInfo, SyncInfoError, PERM_SIZE};
pub use tx::{Phase, Tx, TxState};
pub use workfile::{Cafs, ChunkRecord, TempSink, WorkFile};
