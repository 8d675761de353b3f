//! # atrium-pay: Payment Gateways for the Atrium Storefront
//!
//! A capability abstraction over payment providers, with two concrete
//! backends and cryptographic webhook verification.
//!
//! ## Data Flow At Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OrderWorkflow.create() ──► Order { status: pending }                   │
//! │            │                                                            │
//! │            ▼                                                            │
//! │  PaymentGateway.create_intent(total, "usd", metadata)                   │
//! │            │                                                            │
//! │            ▼                                                            │
//! │  customer pays on the provider's rails                                  │
//! │            │                                                            │
//! │            ▼  (async, retried by the provider)                          │
//! │  webhook delivery ──► verify_webhook(raw_body, signature_header)        │
//! │            │              │                                             │
//! │            │              ├── InvalidSignature → web layer answers 4xx  │
//! │            │              └── PaymentEvent (typed, trusted)             │
//! │            ▼                                                            │
//! │  event.kind.completes_payment() ──► OrderWorkflow.mark_paid()           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`gateway`] - the `PaymentGateway` trait and its wire types
//! - [`card`] - card-network style backend (client-secret flow)
//! - [`redirect`] - redirect/transfer style backend (redirect-URL flow)
//! - [`event`] - verified, typed webhook events
//! - [`signature`] - constant-time HMAC-SHA256 helpers
//! - [`config`] - per-provider configuration from the environment
//! - [`error`] - sanitized payment errors

pub mod card;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod redirect;
pub mod signature;

pub use card::CardGateway;
pub use config::GatewayConfig;
pub use error::PaymentError;
pub use event::{PaymentEvent, PaymentEventKind};
pub use gateway::{IntentMetadata, PaymentGateway, PaymentIntent, Refund};
pub use redirect::RedirectGateway;
