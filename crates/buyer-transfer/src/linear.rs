//! The linear (non-chunked) transmission path: the whole work file goes up
//! in one multipart POST, no synchronization round-trip.

use std::io::Read;

use buyer_primitives::{Cafs, Fingerprint, WorkFile};
use buyer_transport::ScopedTransport;

use crate::error::TransferError;
use crate::multipart::{content_type, encode_fields, new_boundary};
use crate::response::capture_response;

/// POST `work` whole, alongside the hex-encoded `buyer_secret`, and capture
/// the encrypted result the seller streams back.
pub async fn send_linear(
    transport: &ScopedTransport,
    worker_url: &str,
    work: &dyn WorkFile,
    buyer_secret: Fingerprint,
    cafs: &dyn Cafs,
) -> Result<Box<dyn WorkFile>, TransferError> {
    let mut data = Vec::with_capacity(work.size() as usize);
    work.open()?.read_to_end(&mut data)?;

    let boundary = new_boundary();
    let secret_hex = buyer_secret.to_hex();
    let body = encode_fields(&boundary, &[("work", &data), ("buyersecret", secret_hex.as_bytes())]);

    let request = transport
        .client()
        .post(worker_url)
        .header(reqwest::header::CONTENT_TYPE, content_type(&boundary))
        .body(body)
        .build()?;
    let response = transport.execute(request).await?;
    if !response.status().is_success() {
        return Err(TransferError::SellerProtocolError(format!(
            "linear upload rejected with status {}",
            response.status()
        )));
    }
    capture_response(cafs, response).await
}
