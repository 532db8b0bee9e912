//! Draining a seller's HTTP response body into a fresh CAFS temp, shared by
//! the linear and chunked transmission paths.

use futures_util::StreamExt;

use buyer_primitives::{Cafs, WorkFile};

use crate::error::TransferError;

/// Stream `response`'s body into a new CAFS temp sink and finalize it,
/// returning the resulting content-addressed handle (the encrypted result).
pub async fn capture_response(
    cafs: &dyn Cafs,
    response: reqwest::Response,
) -> Result<Box<dyn WorkFile>, TransferError> {
    let mut sink = cafs.create_temp()?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransferError::TransportError(e.to_string()))?;
        sink.write_all(&chunk)?;
    }
    Ok(sink.finish()?)
}

/// Extract the `X-Bitwrk-Assist` response header, if present, as a list of
/// tickets. Absent or malformed headers are simply no tickets — assistive
/// tickets are a best-effort side channel, never load-bearing.
pub fn assist_tickets(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get("X-Bitwrk-Assist")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}
