//! The work transfer sub-protocol (C7): probes a seller's capabilities,
//! picks the linear or chunked transmission path, streams the work (or just
//! its missing chunks) up and the encrypted result down, and signs the
//! closing receipt.
//!
//! This crate only runs the wire protocol against a `workerURL`; the
//! surrounding decision of *when* to run it, and what to do with the
//! encrypted result afterwards (decrypt, hand back to the caller), belongs
//! to the buy activity state machine.

mod assist;
mod capability;
mod chunked;
mod error;
mod gzip;
mod linear;
mod multipart;
mod pipe;
mod receipt;
mod response;

#[cfg(test)]
mod test_stub;

pub use capability::{probe_capabilities, SellerCapabilities};
pub use error::TransferError;

use buyer_assist::AssistiveTicketRegistry;
use buyer_identity::Signer;
use buyer_primitives::{Cafs, Fingerprint, WorkFile};
use buyer_transport::ScopedTransport;

/// Implementation ceiling on the number of chunks a work file may have
/// before chunked synchronization is refused outright.
pub const DEFAULT_MAX_CHUNKS: usize = 16_384;

/// Everything [`transfer_work`] needs to run one transfer end to end.
pub struct TransferParams<'a> {
    pub transport: &'a ScopedTransport,
    pub worker_url: &'a str,
    pub work: &'a dyn WorkFile,
    pub buyer_secret: Fingerprint,
    pub cafs: &'a dyn Cafs,
    pub registry: &'a AssistiveTicketRegistry,
    pub seller: &'a str,
    pub identity: &'a dyn Signer,
    /// Chunk-count ceiling for the chunked path; use [`DEFAULT_MAX_CHUNKS`]
    /// absent a reason to override it.
    pub max_chunks: usize,
    /// Invoked once the (sole, for the linear path; chunk-body, for the
    /// chunked path) upload has begun sending, handing the transmission
    /// token back to the caller's scheduler.
    pub on_admitted: Box<dyn FnOnce() + Send>,
    /// Optional progress callback for the chunked path: `(bytes_total,
    /// bytes_sent)` after each chunk is written. Unused on the linear path.
    pub progress: Option<Box<dyn FnMut(u64, u64) + Send>>,
}

/// What a successful transfer produced.
pub struct TransferOutcome {
    /// The encrypted result the seller streamed back.
    pub enc_result_file: Box<dyn WorkFile>,
    /// Hex-encoded signature over `enc_result_file.key()`, already POSTed to
    /// the seller as the closing receipt.
    pub enc_result_hash_sig: String,
}

/// Run the full work-transfer sub-protocol: probe, transmit, then sign and
/// send the receipt for the encrypted result received.
pub async fn transfer_work(params: TransferParams<'_>) -> Result<TransferOutcome, TransferError> {
    let caps = if params.work.is_chunked() {
        capability::probe_capabilities(params.transport, params.worker_url).await
    } else {
        SellerCapabilities::default()
    };
    let chunked = caps.adler32_chunking && params.work.is_chunked();
    let compressed = caps.gzip_compression;
    let legacy = !caps.sync_info;

    let enc_result_file = if chunked {
        chunked::run(chunked::ChunkedParams {
            transport: params.transport,
            worker_url: params.worker_url,
            work: params.work,
            buyer_secret: params.buyer_secret,
            cafs: params.cafs,
            registry: params.registry,
            seller: params.seller,
            legacy,
            compressed,
            max_chunks: params.max_chunks,
            on_admitted: params.on_admitted,
            progress: params.progress,
        })
        .await?
    } else {
        // The linear path has no wishlist round-trip to gate on: the whole
        // file is admitted to the wire as soon as the single POST starts.
        (params.on_admitted)();
        linear::send_linear(
            params.transport,
            params.worker_url,
            params.work,
            params.buyer_secret,
            params.cafs,
        )
        .await?
    };

    let enc_result_hash_sig = receipt::sign_and_send(
        params.transport,
        params.worker_url,
        params.identity,
        enc_result_file.key(),
    )
    .await?;

    Ok(TransferOutcome { enc_result_file, enc_result_hash_sig })
}
