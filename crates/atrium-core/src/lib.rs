//! # atrium-core: Pure Business Logic for the Atrium Storefront
//!
//! This crate is the **heart** of the Atrium transaction engine. It contains
//! all business rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Atrium Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Web / API layer (external)                     │   │
//! │  │     cart endpoints, checkout endpoint, webhook endpoints        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌──────────────────┐  ┌───────▼────────────┐                          │
//! │  │   atrium-pay     │  │     atrium-db      │                          │
//! │  │ provider HTTP,   │  │ stock ledger, cart │                          │
//! │  │ webhook verify   │  │ store, order flow  │                          │
//! │  └────────┬─────────┘  └───────┬────────────┘                          │
//! │           │                    │                                        │
//! │  ┌────────▼────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ atrium-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ shipping  │  │ validation│  │   │
//! │  │   │  Order    │  │   Money   │  │  tiers    │  │   rules   │  │   │
//! │  │   │  SkuRef   │  │  TaxCalc  │  │  zones    │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Cart, Order, SkuRef, statuses)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`shipping`] - Flat-tier shipping cost table
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are minor units (i64 cents)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod shipping;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use shipping::{ShippingTable, ShippingZone};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Minimum quantity for a single cart line.
pub const MIN_LINE_QUANTITY: i64 = 1;

/// Maximum quantity of a single SKU per order.
///
/// ## Business Reason
/// A hard per-order ceiling: explicit requests above it are rejected, and
/// the login merge clamps to it. Physical stock is the other hard ceiling;
/// whichever is lower wins.
pub const MAX_LINE_QUANTITY: i64 = 100;
