//! Webhook signature primitives.
//!
//! Both providers sign webhook deliveries with HMAC-SHA256 over the raw,
//! unparsed request body (the card provider prepends a timestamp). The
//! comparison goes through the Mac verifier, which is constant-time: an
//! attacker learns nothing from how long a rejection takes, and a body
//! that fails verification is never deserialized.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::PaymentError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a hex-encoded HMAC-SHA256 signature over `message`.
///
/// Fails with `InvalidSignature` on any mismatch, including malformed
/// hex - a garbage signature is just a wrong signature.
pub fn verify_sha256_hex(
    secret: &[u8],
    message: &[u8],
    signature_hex: &str,
) -> Result<(), PaymentError> {
    let signature =
        hex::decode(signature_hex.trim()).map_err(|_| PaymentError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| PaymentError::Config("webhook secret is unusable".to_string()))?;
    mac.update(message);

    // verify_slice is constant-time.
    mac.verify_slice(&signature)
        .map_err(|_| PaymentError::InvalidSignature)
}

/// Computes the hex-encoded HMAC-SHA256 signature for `message`.
///
/// Used by tests and by outbound request signing where a provider
/// requires it.
pub fn sign_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}
