//! Data shape shared by the assistive download ticket registry.
//!
//! The registry itself (the process-wide map and its callback fan-out) lives
//! in the `buyer-assist` crate; this crate only owns the plain data this
//! node tracks, so other crates (chunk transfer, tests) can describe it
//! without depending on the registry's concurrency machinery.

use crate::Fingerprint;

/// One `(seller, handprint)` participation record.
#[derive(Debug, Clone, Default)]
pub struct AssistiveTicketNode {
    /// Short fingerprint identifying "same work being synced".
    pub handprint: Option<Fingerprint>,
    /// Whether our own activity still wishes to send more tickets.
    pub interested: bool,
    /// Tickets we received from the seller, to offer to other buyers.
    pub outgoing: Vec<String>,
    /// Tickets offered to us by other buyers, to forward to the seller.
    pub incoming: Vec<String>,
}

impl AssistiveTicketNode {
    /// A new node for the given handprint, initially interested.
    pub fn new(handprint: Fingerprint) -> Self {
        Self {
            handprint: Some(handprint),
            interested: true,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }
}
