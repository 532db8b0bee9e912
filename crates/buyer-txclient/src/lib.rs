//! The transaction client (C5): sends the buyer's signed messages to the
//! coordinator, polls transaction state, and exposes the phase-wait
//! primitive the buy activity state machine drives through every
//! establish/transmit/finalize phase.

mod client;
mod error;
mod wire;

#[cfg(test)]
mod test_stub;

pub use client::{wait_for_phase, PollConfig, TransactionClient};
pub use error::TxClientError;
