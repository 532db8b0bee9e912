//! Seller capability probing: `OPTIONS workerURL` tells us whether the
//! seller understands chunked synchronization, gzip, and the modern
//! sync-info header.

use reqwest::Method;
use serde::Deserialize;

use buyer_transport::ScopedTransport;

/// The capabilities a seller worker advertises. All false is a safe,
/// always-correct default (it just means "use the linear path").
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SellerCapabilities {
    #[serde(rename = "Adler32Chunking", default)]
    pub adler32_chunking: bool,
    #[serde(rename = "GZIPCompression", default)]
    pub gzip_compression: bool,
    #[serde(rename = "SyncInfo", default)]
    pub sync_info: bool,
}

/// Probe `worker_url` for its capabilities. Any failure — connection error,
/// non-200 status, malformed JSON — degrades to [`SellerCapabilities::default`]
/// rather than failing the transfer; capability discovery is strictly an
/// optimization.
pub async fn probe_capabilities(transport: &ScopedTransport, worker_url: &str) -> SellerCapabilities {
    match probe(transport, worker_url).await {
        Ok(caps) => caps,
        Err(reason) => {
            tracing::debug!(worker_url, %reason, "capability probe failed, falling back to linear transfer");
            SellerCapabilities::default()
        }
    }
}

async fn probe(transport: &ScopedTransport, worker_url: &str) -> Result<SellerCapabilities, String> {
    let request = transport
        .client()
        .request(Method::OPTIONS, worker_url)
        .build()
        .map_err(|e| e.to_string())?;
    let response = transport.execute(request).await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("OPTIONS returned status {}", response.status()));
    }
    response
        .json::<SellerCapabilities>()
        .await
        .map_err(|e| e.to_string())
}
