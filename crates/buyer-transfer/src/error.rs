//! Errors raised while running the work transfer sub-protocol.

/// Failures transferring a work file to a seller and retrieving its
/// encrypted result.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The work file has more chunks than the implementation is willing to
    /// synchronize in one transfer.
    #[error("work file has {num_chunks} chunks, exceeding the limit of {limit}")]
    WorkTooLarge { num_chunks: usize, limit: usize },

    /// The seller's HTTP responses did not follow the expected protocol:
    /// non-200 status, malformed OPTIONS body, malformed wishlist, or a
    /// rejected receipt.
    #[error("seller protocol error: {0}")]
    SellerProtocolError(String),

    /// The underlying transport failed (connection refused, scope closed,
    /// timed out).
    #[error("transport error: {0}")]
    TransportError(String),

    /// Reading the work file or writing into CAFS failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        TransferError::TransportError(err.to_string())
    }
}

impl From<buyer_transport::ScopedTransportError> for TransferError {
    fn from(err: buyer_transport::ScopedTransportError) -> Self {
        TransferError::TransportError(err.to_string())
    }
}
