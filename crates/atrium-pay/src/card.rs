//! Card-network style gateway backend.
//!
//! Flow: `create_intent` returns a client secret the storefront's payment
//! form uses directly; settlement is reported asynchronously through a
//! signed webhook.
//!
//! Webhook signatures arrive as `t=<unix>,v1=<hex>` where `v1` is
//! HMAC-SHA256 over `"{t}.{raw body}"`. The timestamp is part of the
//! signed message, so replaying an old body under a new timestamp fails
//! verification.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use atrium_core::Money;

use crate::config::GatewayConfig;
use crate::error::PaymentError;
use crate::event::{PaymentEvent, PaymentEventKind};
use crate::gateway::{IntentMetadata, PaymentGateway, PaymentIntent, Refund};
use crate::signature::verify_sha256_hex;

/// Card-network style payment backend.
pub struct CardGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl CardGateway {
    /// Builds the backend with a bounded-timeout HTTP client.
    pub fn new(config: GatewayConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(CardGateway { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }
}

// =============================================================================
// Provider wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct IntentStatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    status: String,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct CardEvent {
    #[serde(rename = "type")]
    kind: String,
    data: CardEventData,
}

#[derive(Debug, Deserialize)]
struct CardEventData {
    object: CardEventObject,
}

#[derive(Debug, Deserialize)]
struct CardEventObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

// =============================================================================
// Pure helpers (tested without HTTP)
// =============================================================================

/// Splits `t=<unix>,v1=<hex>` into its parts.
fn parse_signature_header(header: &str) -> Option<(i64, &str)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signature = Some(value),
            // Future scheme versions are ignored, not rejected.
            _ => {}
        }
    }

    Some((timestamp?, signature?))
}

/// Only the provider's explicit success status settles a payment.
fn status_is_settled(status: &str) -> bool {
    status == "succeeded"
}

/// Maps a VERIFIED body to a typed event.
fn parse_event(payload: &[u8]) -> Result<PaymentEvent, PaymentError> {
    let event: CardEvent =
        serde_json::from_slice(payload).map_err(|_| PaymentError::InvalidPayload)?;

    let kind = match event.kind.as_str() {
        "payment_intent.succeeded" => PaymentEventKind::PaymentSucceeded,
        "payment_intent.payment_failed" => PaymentEventKind::PaymentFailed,
        "charge.refunded" => PaymentEventKind::RefundCompleted,
        other => return Err(PaymentError::UnsupportedEvent(other.to_string())),
    };

    Ok(PaymentEvent {
        kind,
        reference: event.data.object.id,
        order_id: event.data.object.metadata.get("order_id").cloned(),
    })
}

// =============================================================================
// Gateway implementation
// =============================================================================

#[async_trait]
impl PaymentGateway for CardGateway {
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentError> {
        debug!(amount = %amount, currency, order_id = %metadata.order_id, "Creating card payment intent");

        let params = [
            ("amount", amount.cents().to_string()),
            ("currency", currency.to_lowercase()),
            ("metadata[order_id]", metadata.order_id.clone()),
            ("metadata[order_number]", metadata.order_number.clone()),
        ];

        let response = self
            .http
            .post(self.url("/v1/payment_intents"))
            .bearer_auth(&self.config.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::processor(format!(
                "intent creation returned HTTP {}",
                response.status()
            )));
        }

        let intent: IntentResponse = response
            .json()
            .await
            .map_err(|_| PaymentError::processor("intent response was not valid JSON"))?;

        debug!(intent_id = %intent.id, "Card payment intent created");

        Ok(PaymentIntent {
            id: intent.id,
            client_secret: Some(intent.client_secret),
            redirect_url: None,
        })
    }

    async fn confirm(&self, reference: &str) -> Result<bool, PaymentError> {
        let response = self
            .http
            .get(self.url(&format!("/v1/payment_intents/{reference}")))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::processor(format!(
                "intent lookup returned HTTP {}",
                response.status()
            )));
        }

        let intent: IntentStatusResponse = response
            .json()
            .await
            .map_err(|_| PaymentError::processor("intent status was not valid JSON"))?;

        Ok(status_is_settled(&intent.status))
    }

    async fn refund(
        &self,
        reference: &str,
        amount: Option<Money>,
    ) -> Result<Refund, PaymentError> {
        debug!(reference, full = amount.is_none(), "Requesting card refund");

        let mut params = vec![("payment_intent", reference.to_string())];
        if let Some(amount) = amount {
            params.push(("amount", amount.cents().to_string()));
        }

        let response = self
            .http
            .post(self.url("/v1/refunds"))
            .bearer_auth(&self.config.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::processor(format!(
                "refund returned HTTP {}",
                response.status()
            )));
        }

        let refund: RefundResponse = response
            .json()
            .await
            .map_err(|_| PaymentError::processor("refund response was not valid JSON"))?;

        Ok(Refund {
            refund_id: refund.id,
            status: refund.status,
            amount_cents: refund.amount,
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<PaymentEvent, PaymentError> {
        let (timestamp, signature) =
            parse_signature_header(signature_header).ok_or(PaymentError::InvalidSignature)?;

        // Signed message is "{t}.{raw body}" - verify BEFORE parsing.
        let mut message = timestamp.to_string().into_bytes();
        message.push(b'.');
        message.extend_from_slice(payload);

        verify_sha256_hex(self.config.webhook_secret.as_bytes(), &message, signature)?;

        parse_event(payload)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
