//! Receipt signing: the final step of the work-transfer sub-protocol,
//! proving to the seller (and, transitively, the coordinator) that the
//! buyer received a specific encrypted result.

use buyer_identity::Signer;
use buyer_primitives::Fingerprint;
use buyer_transport::ScopedTransport;

use crate::error::TransferError;

/// Sign `enc_result_key` and POST the receipt to `worker_url`, returning the
/// hex-encoded signature for the caller to retain alongside the buy
/// activity's state.
pub async fn sign_and_send(
    transport: &ScopedTransport,
    worker_url: &str,
    identity: &dyn Signer,
    enc_result_key: Fingerprint,
) -> Result<String, TransferError> {
    let hash_hex = enc_result_key.to_hex();
    let signature = identity.sign(enc_result_key.as_bytes());

    let form = [("encresulthash", hash_hex.as_str()), ("encresulthashsig", signature.as_str())];
    let request = transport.client().post(worker_url).form(&form).build()?;
    let response = transport.execute(request).await?;
    if !response.status().is_success() {
        return Err(TransferError::SellerProtocolError(format!(
            "receipt rejected with status {}",
            response.status()
        )));
    }
    Ok(signature)
}
