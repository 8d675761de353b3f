//! Redirect/transfer style gateway backend.
//!
//! Flow: `create_intent` returns a redirect URL; the customer authorizes
//! the transfer on the provider's pages and the outcome arrives as a
//! signed webhook.
//!
//! Webhook signatures are a plain hex HMAC-SHA256 over the raw request
//! body, carried in a single header.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use atrium_core::Money;

use crate::config::GatewayConfig;
use crate::error::PaymentError;
use crate::event::{PaymentEvent, PaymentEventKind};
use crate::gateway::{IntentMetadata, PaymentGateway, PaymentIntent, Refund};
use crate::signature::verify_sha256_hex;

/// Redirect/transfer style payment backend.
pub struct RedirectGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl RedirectGateway {
    /// Builds the backend with a bounded-timeout HTTP client.
    pub fn new(config: GatewayConfig) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(RedirectGateway { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }
}

// =============================================================================
// Provider wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct CheckoutRequest<'a> {
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    order_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    checkout_id: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct PaymentStatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
struct RefundRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    refund_id: String,
    status: String,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct TransferEvent {
    event: String,
    payment_id: String,
    #[serde(default)]
    order_id: Option<String>,
}

// =============================================================================
// Pure helpers (tested without HTTP)
// =============================================================================

/// Only the provider's explicit terminal success settles a payment.
fn status_is_completed(status: &str) -> bool {
    status == "COMPLETED"
}

/// Maps a VERIFIED body to a typed event.
fn parse_event(payload: &[u8]) -> Result<PaymentEvent, PaymentError> {
    let event: TransferEvent =
        serde_json::from_slice(payload).map_err(|_| PaymentError::InvalidPayload)?;

    let kind = match event.event.as_str() {
        "payment.completed" => PaymentEventKind::PaymentSucceeded,
        "payment.failed" | "payment.expired" => PaymentEventKind::PaymentFailed,
        "payment.refunded" => PaymentEventKind::RefundCompleted,
        other => return Err(PaymentError::UnsupportedEvent(other.to_string())),
    };

    Ok(PaymentEvent {
        kind,
        reference: event.payment_id,
        order_id: event.order_id,
    })
}

// =============================================================================
// Gateway implementation
// =============================================================================

#[async_trait]
impl PaymentGateway for RedirectGateway {
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentError> {
        debug!(amount = %amount, currency, order_id = %metadata.order_id, "Creating redirect checkout");

        let request = CheckoutRequest {
            amount: amount.cents(),
            currency,
            reference: &metadata.order_number,
            order_id: &metadata.order_id,
        };

        let response = self
            .http
            .post(self.url("/api/v2/checkouts"))
            .header("X-Api-Key", &self.config.secret_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::processor(format!(
                "checkout creation returned HTTP {}",
                response.status()
            )));
        }

        let checkout: CheckoutResponse = response
            .json()
            .await
            .map_err(|_| PaymentError::processor("checkout response was not valid JSON"))?;

        debug!(checkout_id = %checkout.checkout_id, "Redirect checkout created");

        Ok(PaymentIntent {
            id: checkout.checkout_id,
            client_secret: None,
            redirect_url: Some(checkout.redirect_url),
        })
    }

    async fn confirm(&self, reference: &str) -> Result<bool, PaymentError> {
        let response = self
            .http
            .get(self.url(&format!("/api/v2/payments/{reference}")))
            .header("X-Api-Key", &self.config.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::processor(format!(
                "payment lookup returned HTTP {}",
                response.status()
            )));
        }

        let payment: PaymentStatusResponse = response
            .json()
            .await
            .map_err(|_| PaymentError::processor("payment status was not valid JSON"))?;

        Ok(status_is_completed(&payment.status))
    }

    async fn refund(
        &self,
        reference: &str,
        amount: Option<Money>,
    ) -> Result<Refund, PaymentError> {
        debug!(reference, full = amount.is_none(), "Requesting transfer refund");

        let request = RefundRequest {
            amount: amount.map(|a| a.cents()),
        };

        let response = self
            .http
            .post(self.url(&format!("/api/v2/payments/{reference}/refunds")))
            .header("X-Api-Key", &self.config.secret_key)
            .json(&request)
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
            refund_id: refund.refund_id,
            status: refund.status,
            amount_cents: refund.amount,
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<PaymentEvent, PaymentError> {
        // Plain hex HMAC over the raw body - verify BEFORE parsing.
        verify_sha256_hex(
            self.config.webhook_secret.as_bytes(),
            payload,
            signature_header,
        )?;

        parse_event(payload)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sign_sha256_hex;

    const WEBHOOK_SECRET: &str = "whsec_transfer_test";

    fn gateway() -> RedirectGateway {
        RedirectGateway::new(GatewayConfig::new(
            "https://transfers.invalid",
            "ak_test_key",
            WEBHOOK_SECRET,
        ))
        .unwrap()
    }

    #[test]
    fn only_completed_settles() {
        assert!(status_is_completed("COMPLETED"));
        for status in ["PENDING", "AUTHORIZED", "FAILED", "completed", ""] {
            assert!(!status_is_completed(status));
        }
    }

    #[test]
    fn verified_event_parses() {
        let body = br#"{"event":"payment.completed","payment_id":"tr_55","order_id":"ord-12"}"#;
        let sig = sign_sha256_hex(WEBHOOK_SECRET.as_bytes(), body);

        let event = gateway().verify_webhook(body, &sig).unwrap();
        assert_eq!(event.kind, PaymentEventKind::PaymentSucceeded);
        assert_eq!(event.reference, "tr_55");
        assert_eq!(event.order_id.as_deref(), Some("ord-12"));
    }

    #[test]
    fn signature_over_different_payload_is_rejected() {
        let sig = sign_sha256_hex(
            WEBHOOK_SECRET.as_bytes(),
            br#"{"event":"payment.completed","payment_id":"tr_55"}"#,
        );

        let err = gateway()
            .verify_webhook(br#"{"event":"payment.completed","payment_id":"tr_99"}"#, &sig)
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSignature));
    }

    #[test]
    fn verified_garbage_is_invalid_payload() {
        let body = b"<html>definitely not json</html>";
        let sig = sign_sha256_hex(WEBHOOK_SECRET.as_bytes(), body);

        assert!(matches!(
            gateway().verify_webhook(body, &sig),
            Err(PaymentError::InvalidPayload)
        ));
    }

    #[test]
    fn expiry_maps_to_failure() {
        let body = br#"{"event":"payment.expired","payment_id":"tr_1"}"#;
        let sig = sign_sha256_hex(WEBHOOK_SECRET.as_bytes(), body);

        let event = gateway().verify_webhook(body, &sig).unwrap();
        assert_eq!(event.kind, PaymentEventKind::PaymentFailed);
    }
}
