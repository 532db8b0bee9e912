//! The buy activity state machine itself: **New** → **AwaitingClearance** →
//! (**LocalMatched** | **RemoteEstablishing** → **Transmitting** →
//! **ReceiptSigning** → **Decrypting**) → **Done**, with every state
//! short-circuiting to **Failed** on a fatal error.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use buyer_assist::AssistiveTicketRegistry;
use buyer_identity::Signer;
use buyer_primitives::{BuyActivityState, BuyError, Cafs, Fingerprint, Phase, Tx, TxState, WorkFile};
use buyer_transfer::{transfer_work, TransferError, TransferParams};
use buyer_transport::ScopedTransport;
use buyer_txclient::{wait_for_phase, PollConfig, TransactionClient, TxClientError};

use crate::scheduler::{Clearance, ClearanceGate, Scheduler};
use crate::state::{interruptible, Shared};
use crate::{crypto, finalize};

/// Collaborators a remote buy needs that don't change between buys: the
/// signer, the content store, the assistive ticket registry, the
/// scheduler, and the chunk-count ceiling.
pub struct BuyContext {
    pub identity: Arc<dyn Signer>,
    pub cafs: Arc<dyn Cafs>,
    pub registry: AssistiveTicketRegistry,
    pub scheduler: Arc<dyn Scheduler>,
    pub max_chunks: usize,
}

/// Where the remote protocol runs: the coordinator this buy's transaction
/// lives on, and the transaction id an upstream scheduler already assigned
/// when this buy was accepted.
pub struct RemoteTarget {
    pub http: reqwest::Client,
    pub coordinator_base: String,
    pub tx_id: String,
    pub poll_config: PollConfig,
}

/// The phases during which a scoped transport guarding a remote transfer
/// is allowed to stay open.
fn transport_allowed(tx: &Tx) -> bool {
    tx.state == TxState::Active
        && matches!(tx.phase, Phase::SellerEstablished | Phase::Transmitting | Phase::Working)
}

/// One buy: the lock-guarded activity record plus the state machine that
/// drives it to completion.
pub struct BuyActivity {
    shared: Arc<Shared>,
}

impl BuyActivity {
    /// A fresh, not-yet-started activity for `work_file`, taking ownership
    /// of it (the **New** state's "take owning duplicate" is the caller's
    /// job: hand in a handle already duplicated for this buy).
    pub fn new(work_file: Box<dyn WorkFile>, buyer_secret: Fingerprint) -> Self {
        Self {
            shared: Shared::new(BuyActivityState::new(work_file, buyer_secret)),
        }
    }

    /// Current progress counters, read under the activity's serializing
    /// lock.
    pub fn progress(&self) -> buyer_primitives::TransferProgress {
        self.shared.peek(|s| s.progress)
    }

    /// Whether the activity is still alive: still running, or its
    /// background finalizer hasn't completed yet.
    pub fn is_alive(&self) -> bool {
        self.shared.peek(|s| s.alive)
    }

    /// The last fatal error recorded, once the activity has failed.
    pub fn last_error(&self) -> Option<String> {
        self.shared.peek(|s| s.last_error.clone())
    }

    /// Drive this buy to completion: wait for clearance, then either adopt
    /// a locally-matched result or run the full remote protocol.
    ///
    /// `remote` is only consulted on the remote path; a locally-matched
    /// buy makes no network calls at all.
    pub async fn perform_buy(
        &self,
        clearance: Arc<dyn ClearanceGate>,
        remote: RemoteTarget,
        ctx: BuyContext,
        interrupt: CancellationToken,
    ) -> Result<Box<dyn WorkFile>, BuyError> {
        let result = self.run(clearance, remote, ctx, interrupt).await;
        if let Err(error) = &result {
            self.shared.exec_sync(|state| {
                state.last_error = Some(error.to_string());
                state.alive = false;
            });
        }
        result
    }

    async fn run(
        &self,
        clearance: Arc<dyn ClearanceGate>,
        remote: RemoteTarget,
        ctx: BuyContext,
        interrupt: CancellationToken,
    ) -> Result<Box<dyn WorkFile>, BuyError> {
        // 1. New: the activity already holds its owning duplicate (passed
        // to `BuyActivity::new`) and starts `alive`.
        let work = self.shared.peek(|s| {
            s.work_file
                .as_ref()
                .expect("a freshly constructed activity always holds its work file")
                .duplicate()
        });

        // 2. AwaitingClearance.
        let decision = interruptible(&interrupt, clearance.await_clearance(work.as_ref())).await?;
        match decision {
            Clearance::Denied { reason } => Err(BuyError::ClearanceDenied { reason }),
            Clearance::Local(local_sell) => self.run_local_matched(local_sell, &interrupt).await,
            Clearance::Remote => self.run_remote(work, remote, ctx, interrupt).await,
        }
    }

    /// 3. LocalMatched: wait for the paired sell activity, with no network
    /// I/O of any kind.
    async fn run_local_matched(
        &self,
        local_sell: Box<dyn crate::scheduler::LocalSellActivity>,
        interrupt: &CancellationToken,
    ) -> Result<Box<dyn WorkFile>, BuyError> {
        let outcome = interruptible(interrupt, local_sell.await_result()).await?;
        match outcome {
            Some(result) => {
                let kept = result.duplicate();
                self.shared.exec_sync(|s| s.result_file = Some(kept));
                Ok(result)
            }
            None => Err(BuyError::SellProducedNoResult),
        }
    }

    /// 4–8. RemoteEstablishing through Done.
    async fn run_remote(
        &self,
        work: Box<dyn WorkFile>,
        remote: RemoteTarget,
        ctx: BuyContext,
        interrupt: CancellationToken,
    ) -> Result<Box<dyn WorkFile>, BuyError> {
        // 4. RemoteEstablishing.
        let token = interruptible(&interrupt, ctx.scheduler.acquire_transmission_token()).await?;

        let buyer_secret = self.shared.peek(|s| s.buyer_secret);
        let work_hash = work.key();
        let work_secret_hash = Fingerprint::digest_concat(&[work_hash.as_ref(), buyer_secret.as_ref()]);

        let tx_client = Arc::new(TransactionClient::new(
            remote.http.clone(),
            remote.coordinator_base.clone(),
            ctx.identity.clone(),
            remote.tx_id.clone(),
            remote.poll_config,
        ));
        let poll_abort = CancellationToken::new();
        let mut updates = tx_client.poll(poll_abort.clone());

        let establish = tx_client.send_establish_buyer(&work_hash, &work_secret_hash).await;
        if let Err(error) = establish {
            poll_abort.cancel();
            return Err(tx_err(error).tagged("establishing"));
        }

        let established = wait_for_phase_interruptible(
            &mut updates,
            Phase::Transmitting,
            &[Phase::Establishing, Phase::BuyerEstablished, Phase::SellerEstablished],
            &interrupt,
        )
        .await;
        if let Err(error) = established {
            poll_abort.cancel();
            return Err(error.tagged("establishing"));
        }

        // 5. Transmitting.
        let snapshot = tx_client.current().await.ok_or_else(|| {
            BuyError::CoordinatorError("transmitting: no transaction snapshot available".to_string())
        });
        let snapshot = match snapshot {
            Ok(s) => s,
            Err(e) => {
                poll_abort.cancel();
                return Err(e);
            }
        };
        let worker_url = match snapshot.worker_url.clone() {
            Some(url) => url,
            None => {
                poll_abort.cancel();
                return Err(BuyError::SellerProtocolError(
                    "transmitting: seller established without a worker URL".to_string(),
                ));
            }
        };
        let seller = snapshot.seller.clone().unwrap_or_default();

        let transport = ScopedTransport::new(remote.http.clone());
        let watchdog_exit = CancellationToken::new();
        let (predicate_tx, predicate_rx) = watch::channel(transport_allowed(&snapshot));
        let watchdog = buyer_watchdog::spawn(predicate_rx, watchdog_exit.clone());
        watchdog.register(Box::new({
            let transport = transport.clone();
            move || transport.close()
        }));
        spawn_predicate_feed(tx_client.subscribe(), predicate_tx, watchdog_exit.clone());

        let shared_for_progress = self.shared.clone();
        let progress_cb: Box<dyn FnMut(u64, u64) + Send> = Box::new(move |total, sent| {
            shared_for_progress.exec_sync(|s| {
                s.progress.bytes_to_transfer = total;
                s.progress.bytes_transferred = sent;
            });
        });
        let on_admitted: Box<dyn FnOnce() + Send> = Box::new(move || token.release());

        let work_for_transfer = work.duplicate();
        let cafs = ctx.cafs.clone();
        let identity = ctx.identity.clone();
        let registry = ctx.registry.clone();
        let max_chunks = ctx.max_chunks;

        let transfer_fut = transfer_work(TransferParams {
            transport: &transport,
            worker_url: &worker_url,
            work: work_for_transfer.as_ref(),
            buyer_secret,
            cafs: cafs.as_ref(),
            registry: &registry,
            seller: &seller,
            identity: identity.as_ref(),
            max_chunks,
            on_admitted,
            progress: Some(progress_cb),
        });
        let phase_fut = wait_for_phase_interruptible(
            &mut updates,
            Phase::Unverified,
            &[Phase::Transmitting, Phase::Working],
            &interrupt,
        );

        let combined = async { tokio::join!(transfer_fut, phase_fut) };
        tokio::pin!(combined);
        let (transfer_result, phase_result) = tokio::select! {
            biased;
            () = interrupt.cancelled() => {
                transport.close();
                watchdog_exit.cancel();
                poll_abort.cancel();
                let _ = combined.await;
                return Err(BuyError::Interrupted);
            }
            result = &mut combined => result,
        };
        watchdog_exit.cancel();

        let outcome = match (transfer_result, phase_result) {
            (Ok(outcome), Ok(())) => outcome,
            (Err(transfer), Ok(())) => {
                poll_abort.cancel();
                return Err(transfer_err(transfer).tagged("transmitting"));
            }
            (Ok(_), Err(phase)) => {
                poll_abort.cancel();
                return Err(phase.tagged("transmitting"));
            }
            (Err(transfer), Err(phase)) => {
                poll_abort.cancel();
                return Err(transfer_err(transfer)
                    .tagged("transmitting")
                    .combine(phase.tagged("transmitting")));
            }
        };

        // 6. ReceiptSigning already happened as the last step of
        // `transfer_work`; the coordinator publishes the decryption key
        // once it has validated the receipt.

        // 7. Decrypting.
        let enc_result_key = match interruptible(
            &interrupt,
            wait_for_decryption_key(&tx_client, &mut updates),
        )
        .await
        {
            Ok(Ok(key)) => key,
            Ok(Err(e)) => {
                poll_abort.cancel();
                return Err(e.tagged("accepting"));
            }
            Err(e) => {
                poll_abort.cancel();
                return Err(e);
            }
        };

        let enc_result_file = outcome.enc_result_file;
        let enc_reader = enc_result_file.open().map_err(|e| BuyError::CryptoError(e.to_string()));
        let enc_reader = match enc_reader {
            Ok(reader) => reader,
            Err(e) => {
                poll_abort.cancel();
                return Err(e);
            }
        };
        let plaintext_sink = ctx.cafs.create_temp().map_err(|e| BuyError::CryptoError(e.to_string()));
        let plaintext_sink = match plaintext_sink {
            Ok(sink) => sink,
            Err(e) => {
                poll_abort.cancel();
                return Err(e);
            }
        };

        let decrypted = tokio::task::spawn_blocking(move || -> Result<Box<dyn WorkFile>, BuyError> {
            let mut sink = plaintext_sink;
            crypto::crypt_stream(enc_result_key, enc_reader, &mut sink)?;
            sink.finish().map_err(|e| BuyError::CryptoError(e.to_string()))
        })
        .await
        .map_err(|e| BuyError::CryptoError(format!("decrypt task panicked: {e}")));

        let result_file = match decrypted.and_then(|inner| inner) {
            Ok(file) => file,
            Err(e) => {
                poll_abort.cancel();
                return Err(e);
            }
        };

        // 8. Done: hand the result back now, finalize in the background.
        let result_for_caller = result_file.duplicate();
        self.shared.exec_sync(|s| {
            s.enc_result_file = Some(enc_result_file);
            s.enc_result_hash_sig = Some(outcome.enc_result_hash_sig);
            s.enc_result_key = Some(enc_result_key);
            s.result_file = Some(result_file);
        });

        finalize::spawn(tx_client.clone(), tx_client.subscribe(), self.shared.clone(), poll_abort);

        Ok(result_for_caller)
    }
}

/// Feed `updates` into `predicate`, stopping once `transport_allowed`
/// first goes false (closing the watchdog) or `stop` is cancelled (a
/// clean shutdown with nothing left to watch).
fn spawn_predicate_feed(
    mut updates: broadcast::Receiver<Tx>,
    predicate: watch::Sender<bool>,
    stop: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => return,
                received = updates.recv() => {
                    match received {
                        Ok(tx) => {
                            let allowed = transport_allowed(&tx);
                            let _ = predicate.send(allowed);
                            if !allowed {
                                return;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => {
                            let _ = predicate.send(false);
                            return;
                        }
                    }
                }
            }
        }
    });
}

/// Read the already-cached snapshot for `resultDecryptionKey`, falling
/// back to draining `updates` until the coordinator publishes it (or the
/// transaction retires first).
async fn wait_for_decryption_key(
    tx_client: &TransactionClient,
    updates: &mut broadcast::Receiver<Tx>,
) -> Result<Fingerprint, BuyError> {
    if let Some(tx) = tx_client.current().await {
        if let Some(key) = tx.result_decryption_key {
            return Ok(key);
        }
    }
    loop {
        match updates.recv().await {
            Ok(tx) => {
                if let Some(key) = tx.result_decryption_key {
                    return Ok(key);
                }
                if tx.state == TxState::Retired {
                    return Err(BuyError::CoordinatorError(
                        "transaction retired before publishing the result decryption key".to_string(),
                    ));
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
                return Err(BuyError::CoordinatorError(
                    "coordinator poll loop stopped before publishing the result decryption key".to_string(),
                ));
            }
        }
    }
}

async fn wait_for_phase_interruptible(
    updates: &mut broadcast::Receiver<Tx>,
    target: Phase,
    transient: &[Phase],
    interrupt: &CancellationToken,
) -> Result<(), BuyError> {
    tokio::select! {
        biased;
        () = interrupt.cancelled() => Err(BuyError::Interrupted),
        result = wait_for_phase(updates, target, transient) => result.map_err(tx_err),
    }
}

fn tx_err(error: TxClientError) -> BuyError {
    match error {
        TxClientError::Stopped => BuyError::CoordinatorError("transaction poller stopped".to_string()),
        TxClientError::CoordinatorError(msg) => BuyError::CoordinatorError(msg),
        TxClientError::PhaseViolation { observed, allowed } => BuyError::PhaseViolation {
            observed: observed.to_string(),
            allowed: allowed.iter().map(Phase::to_string).collect(),
        },
        TxClientError::Retired => {
            BuyError::CoordinatorError("transaction retired before reaching the awaited phase".to_string())
        }
    }
}

fn transfer_err(error: TransferError) -> BuyError {
    match error {
        TransferError::WorkTooLarge { num_chunks, limit } => BuyError::WorkTooLarge { num_chunks, limit },
        TransferError::SellerProtocolError(msg) => BuyError::SellerProtocolError(msg),
        TransferError::TransportError(msg) => BuyError::TransportError(msg),
        TransferError::Io(e) => BuyError::TransportError(e.to_string()),
    }
}
