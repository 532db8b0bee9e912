//! Coordinator JSON wire shape for a transaction, and its conversion into
//! the buyer-facing [`buyer_primitives::Tx`].
//!
//! The coordinator's HTTP API itself is an external collaborator (see the
//! crate-level docs); this module only covers the one document it hands
//! back from a poll: the current transaction snapshot.

use buyer_primitives::{Fingerprint, Phase, Tx, TxState};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct TxWire {
    id: String,
    state: String,
    phase: String,
    #[serde(rename = "workerurl", default)]
    worker_url: Option<String>,
    #[serde(default)]
    seller: Option<String>,
    #[serde(rename = "resultdecryptionkey", default)]
    result_decryption_key: Option<String>,
}

impl TxWire {
    pub(crate) fn into_tx(self) -> Result<Tx, String> {
        let state = match self.state.as_str() {
            "Active" => TxState::Active,
            "Retired" => TxState::Retired,
            other => return Err(format!("unrecognized transaction state {other:?}")),
        };
        let result_decryption_key = self
            .result_decryption_key
            .as_deref()
            .map(|hex| {
                hex.parse::<Fingerprint>()
                    .map_err(|e| format!("malformed resultdecryptionkey: {e}"))
            })
            .transpose()?;
        Ok(Tx {
            id: self.id,
            state,
            phase: Phase::parse(&self.phase),
            worker_url: self.worker_url,
            seller: self.seller,
            result_decryption_key,
        })
    }
}
