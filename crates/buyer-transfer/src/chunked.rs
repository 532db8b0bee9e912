//! The chunked (content-addressed sync) transmission path: probe which
//! chunks the seller is missing, then push only those, optionally gzipped
//! with periodic flushes so the upload and the seller's reassembly overlap.

use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};

use buyer_assist::AssistiveTicketRegistry;
use buyer_chunk_codec::{
    encode_into, encode_legacy, encode_modern, legacy_entries_from, random_perm, transmission_order,
    unpack_wishlist,
};
use buyer_primitives::{Cafs, ChunkRecord, Fingerprint, SyncInfo, WorkFile};
use buyer_transport::ScopedTransport;

use crate::error::TransferError;
use crate::gzip::{compress, FlushEveryWrite};
use crate::multipart::{closing, content_type, encode_fields, field_header, field_trailer, new_boundary};
use crate::pipe::{byte_pipe, close_with_error};
use crate::response::{assist_tickets, capture_response};

/// Parameters for [`run`]. Grouped into a struct because the chunked path
/// threads through every collaborator the work-transfer sub-protocol needs:
/// transport, storage, the assistive registry, and the scheduler callbacks.
pub struct ChunkedParams<'a> {
    pub transport: &'a ScopedTransport,
    pub worker_url: &'a str,
    pub work: &'a dyn WorkFile,
    pub buyer_secret: Fingerprint,
    pub cafs: &'a dyn Cafs,
    pub registry: &'a AssistiveTicketRegistry,
    pub seller: &'a str,
    pub legacy: bool,
    pub compressed: bool,
    pub max_chunks: usize,
    /// Invoked once the chunk-body POST has begun sending, handing the
    /// transmission token back to the scheduler.
    pub on_admitted: Box<dyn FnOnce() + Send>,
    pub progress: Option<Box<dyn FnMut(u64, u64) + Send>>,
}

/// Run the two-request chunked transmission and return the encrypted result
/// file the seller streams back from the chunk-body POST.
pub async fn run(params: ChunkedParams<'_>) -> Result<Box<dyn WorkFile>, TransferError> {
    let ChunkedParams {
        transport,
        worker_url,
        work,
        buyer_secret,
        cafs,
        registry,
        seller,
        legacy,
        compressed,
        max_chunks,
        on_admitted,
        progress,
    } = params;

    let num_chunks = work.num_chunks();
    if num_chunks > max_chunks {
        return Err(TransferError::WorkTooLarge { num_chunks, limit: max_chunks });
    }

    let records = work.chunks().collect::<io::Result<Vec<_>>>()?;
    let hashes: Vec<Fingerprint> = records.iter().map(|r| r.hash).collect();

    let sync_info = if legacy {
        SyncInfo::legacy(hashes)
    } else {
        let perm = random_perm(&mut rand::thread_rng());
        SyncInfo::new(hashes, perm).expect("random_perm always yields a bijection")
    };
    let order = transmission_order(sync_info.chunk_hashes(), sync_info.perm());
    let handprint = sync_info.handprint();

    if !legacy {
        let assist_transport = transport.clone();
        let assist_worker_url = worker_url.to_string();
        registry.init_node(
            seller,
            handprint,
            Box::new(move |ticket| {
                crate::assist::spawn_assist_sender(assist_transport.clone(), assist_worker_url.clone(), ticket);
            }),
        );
    }

    let wanted = match request_wishlist(
        transport,
        worker_url,
        &sync_info,
        &records,
        buyer_secret,
        legacy,
        compressed,
        registry,
        seller,
        handprint,
    )
    .await
    {
        Ok(wanted) => wanted,
        Err(e) => {
            if !legacy {
                registry.exit_node(seller, handprint);
            }
            return Err(e);
        }
    };

    let result = push_chunk_bodies(
        transport,
        worker_url,
        work,
        cafs,
        &order,
        &wanted,
        compressed,
        registry,
        seller,
        handprint,
        on_admitted,
        progress,
    )
    .await;

    if !legacy {
        registry.set_node_interested(seller, handprint, false);
        registry.exit_node(seller, handprint);
    }

    result
}

#[allow(clippy::too_many_arguments)]
async fn request_wishlist(
    transport: &ScopedTransport,
    worker_url: &str,
    sync_info: &SyncInfo,
    records: &[ChunkRecord],
    buyer_secret: Fingerprint,
    legacy: bool,
    compressed: bool,
    registry: &AssistiveTicketRegistry,
    seller: &str,
    handprint: Fingerprint,
) -> Result<Vec<bool>, TransferError> {
    let header_bytes = if legacy {
        let lengths: Vec<u64> = records.iter().map(|r| r.data.len() as u64).collect();
        encode_legacy(&legacy_entries_from(sync_info, &lengths))
    } else {
        encode_modern(sync_info).map_err(|e| TransferError::SellerProtocolError(e.to_string()))?
    };
    let header_field = if legacy { "a32chunks" } else { "syncinfojson" };

    let boundary = new_boundary();
    let secret_hex = buyer_secret.to_hex();
    let mut body = encode_fields(
        &boundary,
        &[(header_field, header_bytes.as_slice()), ("buyersecret", secret_hex.as_bytes())],
    );
    if compressed {
        body = compress(&body)?;
    }

    let mut builder = transport.client().post(worker_url).header(CONTENT_TYPE, content_type(&boundary));
    if compressed {
        builder = builder.header(CONTENT_ENCODING, "gzip");
    }
    let request = builder.body(body).build()?;
    let response = transport.execute(request).await?;
    if !response.status().is_success() {
        return Err(TransferError::SellerProtocolError(format!(
            "wishlist request rejected with status {}",
            response.status()
        )));
    }
    for ticket in assist_tickets(&response) {
        registry.new_ticket(seller, handprint, ticket);
    }
    let wishlist_bytes = response.bytes().await?;
    Ok(unpack_wishlist(&wishlist_bytes, records.len()))
}

#[allow(clippy::too_many_arguments)]
async fn push_chunk_bodies(
    transport: &ScopedTransport,
    worker_url: &str,
    work: &dyn WorkFile,
    cafs: &dyn Cafs,
    order: &[usize],
    wanted: &[bool],
    compressed: bool,
    registry: &AssistiveTicketRegistry,
    seller: &str,
    handprint: Fingerprint,
    on_admitted: Box<dyn FnOnce() + Send>,
    progress: Option<Box<dyn FnMut(u64, u64) + Send>>,
) -> Result<Box<dyn WorkFile>, TransferError> {
    let boundary = new_boundary();
    let (pipe_writer, body) = byte_pipe(8);
    let error_tx = pipe_writer.error_sender();

    let work_dup = work.duplicate();
    let order_owned = order.to_vec();
    let wanted_owned = wanted.to_vec();
    let boundary_owned = boundary.clone();

    let producer = tokio::task::spawn_blocking(move || {
        let mut progress = progress;
        let preamble = field_header(&boundary_owned, "chunkdata");
        let mut encode = |writer: &mut dyn io::Write| -> io::Result<()> {
            writer.write_all(&preamble)?;
            encode_into(work_dup.as_ref(), &order_owned, &wanted_owned, writer, progress.as_deref_mut())
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            writer.write_all(field_trailer())?;
            writer.write_all(&closing(&boundary_owned))?;
            Ok(())
        };

        let write_result = if compressed {
            let mut writer = FlushEveryWrite {
                inner: GzEncoder::new(pipe_writer, Compression::default()),
            };
            encode(&mut writer).and_then(|()| writer.inner.try_finish())
        } else {
            let mut writer = FlushEveryWrite { inner: pipe_writer };
            encode(&mut writer)
        };
        if let Err(e) = write_result {
            close_with_error(&error_tx, e);
        }
    });

    let mut builder = transport.client().post(worker_url).header(CONTENT_TYPE, content_type(&boundary));
    if compressed {
        builder = builder.header(CONTENT_ENCODING, "gzip");
    }
    let request = builder.body(body).build()?;

    // The producer task is already running (and, once the channel's buffer
    // is full, blocked on its next write) by the time the request is built;
    // the transmission token can be handed back to the scheduler now.
    on_admitted();

    let response = transport.execute(request).await?;
    if !response.status().is_success() {
        return Err(TransferError::SellerProtocolError(format!(
            "chunk body push rejected with status {}",
            response.status()
        )));
    }
    for ticket in assist_tickets(&response) {
        registry.new_ticket(seller, handprint, ticket);
    }

    let outcome = capture_response(cafs, response).await;
    if let Err(join_err) = producer.await {
        tracing::warn!(error = %join_err, "chunk body producer task panicked");
    }
    outcome
}
