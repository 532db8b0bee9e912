//! The narrow interfaces a buy activity needs from its surrounding
//! scheduler: admission into the local match, when one exists, and
//! admission onto the network for a remote transfer.
//!
//! Both are external collaborators (the local matching engine and the
//! scheduler are treated as opaque), so this crate only states the contract
//! it drives them through.

use async_trait::async_trait;

use buyer_primitives::WorkFile;

/// What [`ClearanceGate::await_clearance`] decided for a buy.
pub enum Clearance {
    /// Pricing or policy refused the trade before it started.
    Denied {
        /// Human-readable reason, surfaced in [`buyer_primitives::BuyError::ClearanceDenied`].
        reason: String,
    },
    /// A local counter-party sell activity is bound to this buy; drive the
    /// local-match path instead of the remote protocol.
    Local(Box<dyn LocalSellActivity>),
    /// No local counter-party; drive the remote protocol.
    Remote,
}

/// Blocks a buy in **AwaitingClearance** until pricing/policy approval (or
/// refusal) is known, and tells it whether a local counter-party is bound.
#[async_trait]
pub trait ClearanceGate: Send + Sync {
    /// Decide how this buy should proceed. `work` is lent only for the
    /// duration of the call (e.g. to price by size).
    async fn await_clearance(&self, work: &dyn WorkFile) -> Clearance;
}

/// The paired sell activity a locally-matched buy waits on.
#[async_trait]
pub trait LocalSellActivity: Send + Sync {
    /// Wait until the paired sell ends, returning the result it produced
    /// (if any). A `None` means the sell died without ever producing a
    /// result, which fails the buy with
    /// [`buyer_primitives::BuyError::SellProducedNoResult`].
    async fn await_result(self: Box<Self>) -> Option<Box<dyn WorkFile>>;
}

/// Scheduler-granted admission control bounding the number of concurrent
/// network-bound trades.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Block until the scheduler admits one more remote transmission.
    async fn acquire_transmission_token(&self) -> TransmissionToken;
}

/// A transmission admission, released exactly once: either explicitly via
/// [`TransmissionToken::release`] (the work-transfer sub-protocol releases
/// it the moment its upload actually starts sending) or on drop, whichever
/// comes first.
pub struct TransmissionToken {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl TransmissionToken {
    /// Wrap a scheduler's release callback.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }

    /// A token that releases nothing, for schedulers with no admission
    /// limit to enforce.
    pub fn unlimited() -> Self {
        Self { release: None }
    }

    /// Release the token back to the scheduler. Calling this explicitly
    /// lets the caller hand the token back the instant admission is truly
    /// used, rather than waiting for the token to be dropped.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for TransmissionToken {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
