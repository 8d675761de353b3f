//! # The Payment Gateway Capability
//!
//! One trait, two concrete backends:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PaymentGateway                                    │
//! │                                                                         │
//! │   create_intent ──► provider intent {id, client_secret|redirect_url}   │
//! │   confirm       ──► true ONLY on the provider's explicit success       │
//! │   refund        ──► full refund when no amount is given                 │
//! │   verify_webhook──► constant-time HMAC check, THEN parse, THEN type    │
//! │                                                                         │
//! │   CardGateway      card-network style: client-secret flow,             │
//! │                    timestamped `t=...,v1=...` signatures               │
//! │   RedirectGateway  redirect/transfer style: redirect-URL flow,          │
//! │                    plain hex signature over the raw body               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The trait is dyn-compatible so the web layer can hold
//! `Arc<dyn PaymentGateway>` per configured payment method.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use atrium_core::Money;

use crate::error::PaymentError;
use crate::event::PaymentEvent;

/// Metadata attached to an intent so webhook events can be routed back
/// to the order they pay for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub order_id: String,
    pub order_number: String,
}

/// A created payment intent.
///
/// Exactly one of `client_secret` (card-network flow) or `redirect_url`
/// (redirect flow) is set, depending on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
}

/// Outcome of a refund request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub refund_id: String,
    pub status: String,
    pub amount_cents: i64,
}

/// Capability set every payment provider backend implements.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for `amount`.
    ///
    /// The amount crosses the wire as the provider's minor-unit integer;
    /// `Money` already is minor units, so no lossy conversion happens
    /// here. Raw provider responses are never logged.
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Retrieves provider-side status for a payment reference.
    ///
    /// Returns `true` only for the provider's explicit success status.
    /// A payment still pending is `Ok(false)`, not an error.
    async fn confirm(&self, reference: &str) -> Result<bool, PaymentError>;

    /// Refunds a payment; full refund when `amount` is omitted.
    async fn refund(
        &self,
        reference: &str,
        amount: Option<Money>,
    ) -> Result<Refund, PaymentError>;

    /// Verifies and parses an inbound webhook delivery.
    ///
    /// Signature verification runs over the RAW body, in constant time,
    /// strictly before any deserialization: `InvalidSignature` on
    /// mismatch, `InvalidPayload` only after verification succeeds but
    /// the body is not valid event data.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<PaymentEvent, PaymentError>;
}
