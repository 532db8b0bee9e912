//! The transaction client: sends signed messages to the coordinator, polls
//! transaction state, and implements the phase-wait primitive every caller
//! drives the buy state machine through.

use std::sync::Arc;
use std::time::Duration;

use buyer_identity::Signer;
use buyer_primitives::{Phase, Tx};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::TxClientError;
use crate::wire::TxWire;

/// Poll timing: the base interval between coordinator polls, and the
/// ceiling the exponential backoff is clamped to on repeated failures.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Interval between polls while the coordinator is reachable.
    pub interval: Duration,
    /// Maximum backoff delay after repeated poll failures.
    pub backoff_max: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            backoff_max: Duration::from_secs(30),
        }
    }
}

/// A handle to the coordinator, scoped to one transaction: sends the
/// buyer's signed messages and exposes the polled transaction state as a
/// broadcast stream so multiple `wait_for_phase` calls can each observe
/// every transition in order.
pub struct TransactionClient {
    http: reqwest::Client,
    coordinator_base: String,
    identity: Arc<dyn Signer>,
    tx_id: String,
    poll_config: PollConfig,
    latest: Mutex<Option<Tx>>,
    updates: broadcast::Sender<Tx>,
}

impl TransactionClient {
    /// Build a client for one transaction against `coordinator_base`
    /// (e.g. `https://coordinator.example`).
    pub fn new(
        http: reqwest::Client,
        coordinator_base: impl Into<String>,
        identity: Arc<dyn Signer>,
        tx_id: impl Into<String>,
        poll_config: PollConfig,
    ) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            http,
            coordinator_base: coordinator_base.into(),
            identity,
            tx_id: tx_id.into(),
            poll_config,
            latest: Mutex::new(None),
            updates,
        }
    }

    /// The transaction id this client is scoped to.
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// The most recently polled snapshot, if any poll has completed yet.
    pub async fn current(&self) -> Option<Tx> {
        self.latest.lock().await.clone()
    }

    /// Subscribe to published transaction snapshots without starting a new
    /// poll loop. Every call to [`TransactionClient::poll`] and every call
    /// to this method observes the same sequence of snapshots, each in
    /// order, from the point of subscription onward.
    pub fn subscribe(&self) -> broadcast::Receiver<Tx> {
        self.updates.subscribe()
    }

    /// Send `EstablishBuyer(txId, identity, workHash, workSecretHash)`,
    /// signed with the caller's identity.
    pub async fn send_establish_buyer(
        &self,
        work_hash: &buyer_primitives::Fingerprint,
        work_secret_hash: &buyer_primitives::Fingerprint,
    ) -> Result<(), TxClientError> {
        let fields = [
            ("type", "EstablishBuyer".to_string()),
            ("txid", self.tx_id.clone()),
            ("identity", self.identity.identity().to_string()),
            ("workhash", work_hash.to_hex()),
            ("worksecrethash", work_secret_hash.to_hex()),
        ];
        self.send_signed_message(&fields).await
    }

    /// Send `AcceptResult(txId, identity)`, signed with the caller's
    /// identity.
    pub async fn send_accept_result(&self) -> Result<(), TxClientError> {
        let fields = [
            ("type", "AcceptResult".to_string()),
            ("txid", self.tx_id.clone()),
            ("identity", self.identity.identity().to_string()),
        ];
        self.send_signed_message(&fields).await
    }

    async fn send_signed_message(&self, fields: &[(&str, String)]) -> Result<(), TxClientError> {
        let message = fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let signature = self.identity.sign(message.as_bytes());

        let mut form: Vec<(&str, String)> = fields.to_vec();
        form.push(("signature", signature));

        let url = format!("{}/tx/{}", self.coordinator_base, self.tx_id);
        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TxClientError::CoordinatorError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TxClientError::CoordinatorError(format!(
                "coordinator returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Start the background poll loop: periodically re-fetches the
    /// transaction document, updates the cached snapshot, and publishes
    /// every change (in order) on the returned [`broadcast::Receiver`].
    /// Polling stops when `abort` is cancelled. Errors are retried with
    /// exponential backoff, capped at `poll_config.backoff_max`; the
    /// backoff resets to `poll_config.interval` after any successful poll.
    pub fn poll(self: &Arc<Self>, abort: CancellationToken) -> broadcast::Receiver<Tx> {
        let rx = self.updates.subscribe();
        let client = self.clone();
        tokio::spawn(async move {
            let mut backoff = client.poll_config.interval;
            loop {
                tokio::select! {
                    biased;
                    () = abort.cancelled() => {
                        tracing::debug!(tx_id = %client.tx_id, "poll loop exiting");
                        return;
                    }
                    () = tokio::time::sleep(backoff) => {}
                }

                match client.fetch_tx().await {
                    Ok(tx) => {
                        backoff = client.poll_config.interval;
                        let retired = tx.state == buyer_primitives::TxState::Retired;
                        *client.latest.lock().await = Some(tx.clone());
                        // A lagging or absent receiver is not fatal: the
                        // broadcast is best-effort fan-out over an
                        // already-cached `latest` snapshot.
                        let _ = client.updates.send(tx);
                        if retired {
                            tracing::debug!(tx_id = %client.tx_id, "transaction retired, poll loop exiting");
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(tx_id = %client.tx_id, error = %e, backoff_secs = backoff.as_secs(), "poll failed, backing off");
                        backoff = std::cmp::min(backoff * 2, client.poll_config.backoff_max);
                    }
                }
            }
        });
        rx
    }

    async fn fetch_tx(&self) -> Result<Tx, TxClientError> {
        let url = format!("{}/tx/{}", self.coordinator_base, self.tx_id);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TxClientError::CoordinatorError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TxClientError::CoordinatorError(format!(
                "coordinator returned {}",
                response.status()
            )));
        }
        let wire: TxWire = response
            .json()
            .await
            .map_err(|e| TxClientError::CoordinatorError(e.to_string()))?;
        wire.into_tx().map_err(TxClientError::CoordinatorError)
    }
}

/// Block on `updates` until `tx.phase == target`, per the protocol's
/// phase-wait primitive: fails the moment an observed phase is neither the
/// target nor in `transient`, or the transaction retires early.
pub async fn wait_for_phase(
    updates: &mut broadcast::Receiver<Tx>,
    target: Phase,
    transient: &[Phase],
) -> Result<(), TxClientError> {
    loop {
        let tx = match updates.recv().await {
            Ok(tx) => tx,
            Err(broadcast::error::RecvError::Closed) => return Err(TxClientError::Stopped),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                return Err(TxClientError::CoordinatorError(format!(
                    "missed {skipped} phase updates while lagged"
                )));
            }
        };
        if tx.state == buyer_primitives::TxState::Retired {
            return Err(TxClientError::Retired);
        }
        if tx.phase == target {
            return Ok(());
        }
        if !transient.contains(&tx.phase) {
            let mut allowed = transient.to_vec();
            allowed.push(target);
            return Err(TxClientError::PhaseViolation {
                observed: tx.phase,
                allowed,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use buyer_identity::LocalSigner;

    use super::*;
    use crate::test_stub::{spawn_stub, StubResponse};

    fn signer() -> Arc<dyn Signer> {
        let mut rng = rand::thread_rng();
        Arc::new(LocalSigner::generate("buyer-1", &mut rng))
    }

    #[tokio::test]
    async fn establish_buyer_posts_signed_form() {
        let seen_path = Arc::new(std::sync::Mutex::new(None));
        let seen_path_clone = seen_path.clone();
        let (base_url, _task) = spawn_stub(move |req| {
            *seen_path_clone.lock().unwrap() = Some((req.method, req.path));
            StubResponse::ok()
        })
        .await;

        let client = Arc::new(TransactionClient::new(
            reqwest::Client::new(),
            base_url,
            signer(),
            "tx-1",
            PollConfig::default(),
        ));

        let work_hash = buyer_primitives::Fingerprint::digest(b"work");
        let secret_hash = buyer_primitives::Fingerprint::digest(b"secret");
        client
            .send_establish_buyer(&work_hash, &secret_hash)
            .await
            .unwrap();

        let (method, path) = seen_path.lock().unwrap().clone().unwrap();
        assert_eq!(method, "POST");
        assert_eq!(path, "/tx/tx-1");
    }

    #[tokio::test]
    async fn wait_for_phase_succeeds_through_transients() {
        let (tx, mut rx) = broadcast::channel(16);
        let seq = [
            Phase::Establishing,
            Phase::BuyerEstablished,
            Phase::SellerEstablished,
            Phase::Transmitting,
        ];
        for phase in seq {
            let mut snapshot = Tx::new("tx-1");
            snapshot.phase = phase;
            tx.send(snapshot).unwrap();
        }
        let result = wait_for_phase(
            &mut rx,
            Phase::Transmitting,
            &[
                Phase::Establishing,
                Phase::BuyerEstablished,
                Phase::SellerEstablished,
            ],
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn wait_for_phase_fails_on_unexpected_phase() {
        let (tx, mut rx) = broadcast::channel(16);
        let mut snapshot = Tx::new("tx-1");
        snapshot.phase = Phase::Finished;
        tx.send(snapshot).unwrap();

        let err = wait_for_phase(
            &mut rx,
            Phase::Transmitting,
            &[Phase::Establishing, Phase::BuyerEstablished],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TxClientError::PhaseViolation { .. }));
    }

    #[tokio::test]
    async fn wait_for_phase_fails_when_retired_early() {
        let (tx, mut rx) = broadcast::channel(16);
        let mut snapshot = Tx::new("tx-1");
        snapshot.phase = Phase::Establishing;
        snapshot.state = buyer_primitives::TxState::Retired;
        tx.send(snapshot).unwrap();

        let err = wait_for_phase(&mut rx, Phase::Transmitting, &[Phase::Establishing])
            .await
            .unwrap_err();
        assert!(matches!(err, TxClientError::Retired));
    }

    #[tokio::test]
    async fn wait_for_phase_fails_when_retired_even_if_phase_matches_target() {
        // spec.md states the Retired failure unconditionally, with no
        // carve-out for the snapshot's phase happening to equal the target
        // in the same update.
        let (tx, mut rx) = broadcast::channel(16);
        let mut snapshot = Tx::new("tx-1");
        snapshot.phase = Phase::Transmitting;
        snapshot.state = buyer_primitives::TxState::Retired;
        tx.send(snapshot).unwrap();

        let err = wait_for_phase(&mut rx, Phase::Transmitting, &[Phase::Establishing])
            .await
            .unwrap_err();
        assert!(matches!(err, TxClientError::Retired));
    }

    #[tokio::test]
    async fn poll_publishes_snapshots_and_stops_on_abort() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let (base_url, _task) = spawn_stub(move |_req| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            StubResponse::json(
                r#"{"id":"tx-1","state":"Active","phase":"Establishing"}"#.as_bytes(),
            )
        })
        .await;

        let client = Arc::new(TransactionClient::new(
            reqwest::Client::new(),
            base_url,
            signer(),
            "tx-1",
            PollConfig {
                interval: Duration::from_millis(10),
                backoff_max: Duration::from_millis(50),
            },
        ));
        let abort = CancellationToken::new();
        let mut rx = client.poll(abort.clone());

        let tx = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.phase, Phase::Establishing);
        assert!(client.current().await.is_some());

        abort.cancel();
    }
}
