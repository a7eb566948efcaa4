use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::WebhookDispatchError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Check an `X-Hub-Signature-256` header against the raw request body.
///
/// The comparison is constant-time.
pub fn verify(secret: &[u8], payload: &[u8], signature: &str) -> Result<(), WebhookDispatchError> {
    let signature_hex = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(WebhookDispatchError::InvalidSignature)?;
    let signature_bytes =
        hex::decode(signature_hex).map_err(|_| WebhookDispatchError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| WebhookDispatchError::InvalidSignature)?;
    mac.update(payload);
    mac.verify_slice(&signature_bytes)
        .map_err(|_| WebhookDispatchError::InvalidSignature)
}
