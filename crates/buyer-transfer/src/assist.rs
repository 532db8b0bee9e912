//! Forwarding an assistive download ticket to a seller: a best-effort,
//! fire-and-forget side channel. A failed send is logged and otherwise
//! ignored — losing a ticket never fails a trade.

use buyer_transport::ScopedTransport;

use crate::multipart::{content_type, encode_fields, new_boundary};

/// Spawn a task that POSTs `ticket` (as the `assisturl` field) to
/// `worker_url` and discards the result beyond logging a failure.
pub fn spawn_assist_sender(transport: ScopedTransport, worker_url: String, ticket: String) {
    tokio::spawn(async move {
        let boundary = new_boundary();
        let body = encode_fields(&boundary, &[("assisturl", ticket.as_bytes())]);
        let built = transport
            .client()
            .post(&worker_url)
            .header(reqwest::header::CONTENT_TYPE, content_type(&boundary))
            .body(body)
            .build();
        let request = match built {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(worker_url, %error, "failed to build assistive ticket request");
                return;
            }
        };
        match transport.execute(request).await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(worker_url, status = %response.status(), "seller rejected assistive ticket");
            }
            Err(error) => {
                tracing::warn!(worker_url, %error, "failed to forward assistive ticket");
            }
            Ok(_) => {}
        }
    });
}
