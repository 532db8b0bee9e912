//! The background finalizer: spawned the moment **Done** has already
//! handed a result back to the caller. It sends `AcceptResult` and polls
//! until the transaction leaves `Active`, then clears `alive`.
//!
//! Per the design notes this step is deliberately *not* cancellable by the
//! caller — there is no way to call it back once the result has shipped,
//! so a dropped interest in the outcome does not stop it from running.
//! Failures here are logged, never raised (see the error propagation
//! policy).

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use buyer_primitives::{Tx, TxState};
use buyer_txclient::TransactionClient;

use crate::state::Shared;

/// Spawn the finalizer task.
pub(crate) fn spawn(
    tx_client: Arc<TransactionClient>,
    mut updates: broadcast::Receiver<Tx>,
    shared: Arc<Shared>,
    poll_abort: CancellationToken,
) {
    tokio::spawn(async move {
        if let Err(error) = tx_client.send_accept_result().await {
            tracing::warn!(tx_id = tx_client.tx_id(), %error, "finalizer failed to send AcceptResult");
        }

        loop {
            match updates.recv().await {
                Ok(tx) if tx.state == TxState::Retired => break,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        poll_abort.cancel();
        shared.exec_sync(|state| state.alive = false);
        tracing::debug!(tx_id = tx_client.tx_id(), "buy activity finalized");
    });
}
