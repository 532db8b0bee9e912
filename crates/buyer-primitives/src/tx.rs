//! Buyer-side view of a coordinator transaction ([`Tx`]) and its phases.

use crate::Fingerprint;

/// Overall liveness of a transaction, independent of `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// The transaction is still progressing.
    Active,
    /// The transaction has concluded (successfully or not); no further
    /// phase transitions will occur.
    Retired,
}

/// A transaction phase, as published by the coordinator.
///
/// Phases form a DAG the buyer walks forward through; an unrecognized phase
/// string from the coordinator is preserved in [`Phase::Other`] rather than
/// rejected outright, so a buyer built against an older phase list keeps
/// working against a coordinator that has added new phases elsewhere in the
/// DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Transaction created, not yet accepted by either side.
    Establishing,
    /// The buyer has sent `EstablishBuyer`.
    BuyerEstablished,
    /// The seller has accepted and the worker URL is known.
    SellerEstablished,
    /// The buyer is transmitting the work to the seller.
    Transmitting,
    /// The seller is running the worker program.
    Working,
    /// The seller has delivered a result that is pending receipt signature.
    Unverified,
    /// The coordinator has published the decryption key; the trade is done.
    Finished,
    /// Any phase name not recognized above.
    Other(String),
}

impl Phase {
    /// Parse a coordinator-supplied phase name.
    pub fn parse(name: &str) -> Self {
        match name {
            "Establishing" => Phase::Establishing,
            "BuyerEstablished" => Phase::BuyerEstablished,
            "SellerEstablished" => Phase::SellerEstablished,
            "Transmitting" => Phase::Transmitting,
            "Working" => Phase::Working,
            "Unverified" => Phase::Unverified,
            "Finished" => Phase::Finished,
            other => Phase::Other(other.to_string()),
        }
    }

    /// The coordinator-facing name of this phase.
    pub fn name(&self) -> &str {
        match self {
            Phase::Establishing => "Establishing",
            Phase::BuyerEstablished => "BuyerEstablished",
            Phase::SellerEstablished => "SellerEstablished",
            Phase::Transmitting => "Transmitting",
            Phase::Working => "Working",
            Phase::Unverified => "Unverified",
            Phase::Finished => "Finished",
            Phase::Other(name) => name,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Buyer-side snapshot of a coordinator transaction, refreshed by polling.
#[derive(Debug, Clone)]
pub struct Tx {
    /// Coordinator-assigned transaction id.
    pub id: String,
    /// Overall liveness.
    pub state: TxState,
    /// Current protocol phase.
    pub phase: Phase,
    /// HTTPS endpoint at the seller, populated once `SellerEstablished`.
    pub worker_url: Option<String>,
    /// Opaque seller identity string.
    pub seller: Option<String>,
    /// 256-bit key, populated only after the receipt has been signed and
    /// accepted by the coordinator.
    pub result_decryption_key: Option<Fingerprint>,
}

impl Tx {
    /// A freshly established transaction, as seen right after creation.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: TxState::Active,
            phase: Phase::Establishing,
            worker_url: None,
            seller: None,
            result_decryption_key: None,
        }
    }
}
