//! The plain data record behind one buy ([`BuyActivityState`]).
//!
//! This crate only owns the fields; the locking discipline and the state
//! machine that mutates them under `execSync`/`waitWhile` (see the
//! concurrency model) live in `buyer-activity`.

use crate::{Fingerprint, Tx, WorkFile};

/// Why a buy ended without producing a result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuyError {
    /// The caller or scheduler requested an abort.
    #[error("interrupted")]
    Interrupted,
    /// Pricing or policy refused the trade before it started.
    #[error("clearance denied: {reason}")]
    ClearanceDenied {
        /// Human-readable reason given by the clearance authority.
        reason: String,
    },
    /// The paired local sell activity ended without a result.
    #[error("local sell produced no result")]
    SellProducedNoResult,
    /// A network or auth failure talking to the coordinator.
    #[error("coordinator error: {0}")]
    CoordinatorError(String),
    /// An observed phase fell outside the allowed set for a phase wait.
    #[error("phase violation: observed {observed}, allowed {allowed:?}")]
    PhaseViolation {
        /// The phase that was observed.
        observed: String,
        /// The phases that would have been acceptable.
        allowed: Vec<String>,
    },
    /// A non-200 response, malformed header, or rejected receipt from the
    /// seller.
    #[error("seller protocol error: {0}")]
    SellerProtocolError(String),
    /// A raw I/O failure talking to the coordinator or seller.
    #[error("transport error: {0}")]
    TransportError(String),
    /// The decryption pipeline failed.
    #[error("crypto error: {0}")]
    CryptoError(String),
    /// The work file exceeds the implementation's chunk count bound.
    #[error("work too large: {num_chunks} chunks exceeds limit of {limit}")]
    WorkTooLarge {
        /// The chunk count of the offending work file.
        num_chunks: usize,
        /// The implementation bound that was exceeded.
        limit: usize,
    },
}

impl BuyError {
    /// Wrap this error with a short phase tag, per the propagation policy:
    /// lower-level errors are wrapped with a tag like `"establishing"` or
    /// `"transmitting"` rather than losing their original message.
    pub fn tagged(self, phase: &str) -> Self {
        match self {
            BuyError::CoordinatorError(msg) => {
                BuyError::CoordinatorError(format!("{phase}: {msg}"))
            }
            BuyError::TransportError(msg) => BuyError::TransportError(format!("{phase}: {msg}")),
            BuyError::SellerProtocolError(msg) => {
                BuyError::SellerProtocolError(format!("{phase}: {msg}"))
            }
            BuyError::CryptoError(msg) => BuyError::CryptoError(format!("{phase}: {msg}")),
            other => other,
        }
    }

    /// Combine two simultaneous failures into one message, per the policy
    /// that when both the peer interaction and the phase wait fail, both
    /// messages are concatenated in the final error.
    pub fn combine(self, other: BuyError) -> BuyError {
        BuyError::TransportError(format!("{self}; {other}"))
    }
}

/// Progress counters for an in-flight transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferProgress {
    /// Total bytes expected to be transferred.
    pub bytes_to_transfer: u64,
    /// Bytes transferred so far.
    pub bytes_transferred: u64,
}

/// The per-buy record described by the data model. Field mutation discipline
/// (the `execSync` critical section) is enforced by `buyer-activity`, not by
/// this type itself.
pub struct BuyActivityState {
    /// The work file being sold, owned by this activity.
    pub work_file: Option<Box<dyn WorkFile>>,
    /// 256-bit secret generated for this buy.
    pub buyer_secret: Fingerprint,
    /// Handle to the encrypted result once captured from the seller.
    pub enc_result_file: Option<Box<dyn WorkFile>>,
    /// Signature over `enc_result_file.key()`, once signed.
    pub enc_result_hash_sig: Option<String>,
    /// Decryption key for the encrypted result, once published.
    pub enc_result_key: Option<Fingerprint>,
    /// The final plaintext result, once decrypted.
    pub result_file: Option<Box<dyn WorkFile>>,
    /// Cached transaction snapshot.
    pub tx: Option<Tx>,
    /// Coordinator-assigned transaction id, once established.
    pub tx_id: Option<String>,
    /// Progress counters for the current transfer.
    pub progress: TransferProgress,
    /// Whether the activity is still alive (cleared on terminal states).
    pub alive: bool,
    /// The last fatal error recorded, if any.
    pub last_error: Option<String>,
}

impl BuyActivityState {
    /// A fresh, not-yet-started activity record for the given work file and
    /// random buyer secret.
    pub fn new(work_file: Box<dyn WorkFile>, buyer_secret: Fingerprint) -> Self {
        Self {
            work_file: Some(work_file),
            buyer_secret,
            enc_result_file: None,
            enc_result_hash_sig: None,
            enc_result_key: None,
            result_file: None,
            tx: None,
            tx_id: None,
            progress: TransferProgress::default(),
            alive: true,
            last_error: None,
        }
    }
}
