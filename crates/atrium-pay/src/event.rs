//! Typed payment events.
//!
//! Webhook deliveries become one of these ONLY after their signature has
//! been verified; nothing in the order workflow ever trusts an unverified
//! payload. The web layer maps a verified event onto the order workflow:
//! a payment-succeeded event drives `mark_paid`, everything else is
//! informational.

use serde::{Deserialize, Serialize};

/// What happened at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    /// Payment settled; the referenced order should be marked paid.
    PaymentSucceeded,
    /// Payment failed or was declined; the order stays pending.
    PaymentFailed,
    /// A refund completed; informational for the engine.
    RefundCompleted,
}

impl PaymentEventKind {
    /// True when the event should advance the referenced order to paid.
    pub fn completes_payment(self) -> bool {
        matches!(self, PaymentEventKind::PaymentSucceeded)
    }
}

/// A verified, typed webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub kind: PaymentEventKind,

    /// Provider-side reference (intent id / payment id).
    pub reference: String,

    /// The order this event is about, if the provider echoed it back
    /// through metadata.
    pub order_id: Option<String>,
}
