//! Payment error types.
//!
//! Provider failures are wrapped in `PaymentError::Processor` with a
//! sanitized message: length-capped, control characters stripped, never
//! the raw response body. Business code and logs only ever see the
//! sanitized form; the end user sees something even more generic at the
//! web layer.

use thiserror::Error;

/// Hard cap on processor detail carried in an error message.
pub const MAX_PROCESSOR_MESSAGE_LEN: usize = 200;

/// Payment processing errors.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Webhook signature did not match the raw body.
    ///
    /// The web layer must answer this with a client error status so the
    /// provider's retries are distinguishable from a logic bug.
    #[error("Webhook signature verification failed")]
    InvalidSignature,

    /// Signature verified but the body is not valid event data.
    #[error("Webhook payload is not valid event data")]
    InvalidPayload,

    /// Signature verified and parsed, but the event type is unknown.
    #[error("Unsupported webhook event type: {0}")]
    UnsupportedEvent(String),

    /// Any provider-side failure: network, timeout, decline, HTTP error.
    /// The message is sanitized; see [`PaymentError::processor`].
    #[error("Payment processor error: {message}")]
    Processor { message: String },

    /// Gateway misconfiguration (missing secret, bad base URL, ...).
    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Wraps provider detail with the mandatory sanitization applied.
    pub fn processor(raw: impl AsRef<str>) -> Self {
        PaymentError::Processor {
            message: sanitize_processor_message(raw.as_ref()),
        }
    }
}

/// Length-caps and flattens provider detail.
///
/// Control characters (stack trace line breaks included) become spaces,
/// and anything past the cap is dropped. Card numbers never appear in
/// provider error strings we construct, and raw bodies are never passed
/// through here in the first place.
fn sanitize_processor_message(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_PROCESSOR_MESSAGE_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest error strings describe the transport failure, not the
        // response body.
        PaymentError::processor(err.to_string())
    }
}
