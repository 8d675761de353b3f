//! # Error Types
//!
//! Domain-specific error types for atrium-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atrium-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  atrium-db errors (separate crate)                                     │
//! │  ├── DbError          - Storage failures                               │
//! │  └── StoreError       - Domain | Storage union for workflows           │
//! │                                                                         │
//! │  atrium-pay errors (separate crate)                                    │
//! │  └── PaymentError     - Provider and webhook failures                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Business-rule errors carry enough detail to correct the request
//!    (e.g. units actually available)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// These are surfaced to the caller as user-facing validation errors and
/// are never retried automatically.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Variant cannot be found, or belongs to a different product.
    #[error("Product variant not found: {0}")]
    VariantNotFound(String),

    /// Not enough stock to satisfy the request.
    ///
    /// Never silently clamped: the caller sees exactly how many units are
    /// available and decides what to do.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Product is deactivated or the variant is unavailable.
    #[error("{sku} is not available for purchase")]
    Unavailable { sku: String },

    /// Cart cannot be found.
    #[error("Cart not found: {0}")]
    CartNotFound(String),

    /// Cart line cannot be found.
    #[error("Cart line not found: {0}")]
    LineNotFound(String),

    /// Order creation requires a non-empty cart.
    #[error("Cannot create an order from an empty cart")]
    EmptyCart,

    /// A required shipping field is missing.
    #[error("Invalid shipping details: {field} is required")]
    InvalidShipping { field: String },

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The requested status change is not a legal transition.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order has already been cancelled.
    #[error("Order {0} is already cancelled")]
    AlreadyCancelled(String),

    /// Orders that have shipped or been delivered cannot be cancelled.
    #[error("Order {0} has already shipped or been delivered")]
    AlreadyShippedOrDelivered(String),

    /// The order is older than the cancellation window.
    #[error("Order {order_id} is outside the {hours}h cancellation window")]
    CancellationWindowExpired { order_id: String, hours: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g. malformed country code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
