//! # Domain Types
//!
//! Core domain types for the Atrium storefront transaction engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Cart       │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  user  ⊕ sess.  │   │  order_number   │       │
//! │  │  price_cents    │   │  CartLine[]     │   │  status         │       │
//! │  │  is_active      │   │                 │   │  totals, addr.  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ ProductVariant  │   │     SkuRef      │   │   OrderLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  adjustment     │   │  Product(id)    │   │  name snapshot  │       │
//! │  │  is_available   │   │  Variant(id)    │   │  price snapshot │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, order_number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000.
/// 825 bps = 8.25%, representable without floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if the tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Catalog (read side)
// =============================================================================

/// A product in the catalog, as read by the transaction engine.
///
/// The catalog itself (creation, editing, search) is owned by the excluded
/// admin layer; the engine only reads these records and never re-reads them
/// after an order line snapshot has been taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name, copied into order line snapshots.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Base price in cents.
    pub price_cents: i64,

    /// Whether the product can currently be sold (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the base price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// A sellable variation of a product (size, colour, ...).
///
/// A variant has its own stock counter and adjusts the base price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,

    /// Variant display name, copied into order line snapshots.
    pub name: String,

    /// Signed adjustment on the product's base price, in cents.
    pub price_adjustment_cents: i64,

    /// Whether this variant can currently be sold.
    pub is_available: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SKU Reference
// =============================================================================

/// Reference to a stock-keeping unit: either a base product or one of its
/// variants, never both.
///
/// Every stock counter is keyed by exactly one SkuRef. The derived `Ord`
/// gives a stable global order (products before variants, then by id),
/// which the order workflow uses to take reservations in a deterministic
/// sequence so overlapping orders cannot deadlock each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SkuRef {
    /// Stock tracked on the base product.
    Product(String),
    /// Stock tracked on a specific variant.
    Variant(String),
}

impl SkuRef {
    /// Returns the referenced id regardless of kind.
    pub fn id(&self) -> &str {
        match self {
            SkuRef::Product(id) | SkuRef::Variant(id) => id,
        }
    }
}

impl fmt::Display for SkuRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkuRef::Product(id) => write!(f, "product:{id}"),
            SkuRef::Variant(id) => write!(f, "variant:{id}"),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The owner of a cart: an authenticated user or an anonymous session,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CartIdentity {
    /// Cart owned by an authenticated user.
    User(String),
    /// Cart owned by an anonymous browser session.
    Session(String),
}

/// A mutable pre-purchase basket.
///
/// Created lazily on first add; destroyed on successful order creation,
/// explicit clear, or when a guest cart is merged into a user cart at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Cart {
    pub id: String,
    pub user_id: Option<String>,
    pub session_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Returns the owning identity.
    ///
    /// Exactly one of the two owner columns is set; the database enforces
    /// this with a CHECK constraint.
    pub fn identity(&self) -> Option<CartIdentity> {
        match (&self.user_id, &self.session_key) {
            (Some(user), None) => Some(CartIdentity::User(user.clone())),
            (None, Some(session)) => Some(CartIdentity::Session(session.clone())),
            _ => None,
        }
    }
}

/// One SKU in a cart.
///
/// Unique per (cart, product, variant): adding the same SKU again increases
/// the quantity instead of creating a duplicate line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLine {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    /// Returns the stock-keeping unit this line draws from.
    ///
    /// A line with a variant draws from the variant's counter, not the
    /// product's.
    pub fn sku_ref(&self) -> SkuRef {
        match &self.variant_id {
            Some(variant) => SkuRef::Variant(variant.clone()),
            None => SkuRef::Product(self.product_id.clone()),
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle state of an order.
///
/// ## State Machine
/// ```text
/// pending ──► processing ──► shipped ──► delivered
///    │             │
///    └──────┬──────┘
///           ▼
///       cancelled
/// ```
/// `delivered` and `cancelled` are terminal. Every other transition is
/// rejected with `InvalidTransition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order created, payment not yet confirmed.
    Pending,
    /// Payment confirmed, order being prepared.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Confirmed received.
    Delivered,
    /// Cancelled before shipping; stock has been restored.
    Cancelled,
}

impl OrderStatus {
    /// Checks whether a transition to `next` is legal.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Only orders that have not shipped can be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Stable lowercase name, matching the database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer pays, which selects the gateway backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card-network style provider (client-secret flow).
    Card,
    /// Redirect/transfer style provider (redirect-URL flow).
    BankTransfer,
}

// =============================================================================
// Shipping Info
// =============================================================================

/// Destination details captured at checkout and frozen onto the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code; selects the shipping tier.
    pub country: String,
    pub phone: Option<String>,
}

// =============================================================================
// Order
// =============================================================================

/// An immutable, paid-for order.
///
/// After creation only `status`, `tracking_number` and `paid_at` ever
/// change. Everything else - totals, address, line snapshots - is frozen so
/// that order history survives later catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,

    /// Human-readable sequential number, `PREFIX-YYYY-NNNNNN`.
    pub order_number: String,

    pub user_id: String,
    pub status: OrderStatus,

    // Shipping address snapshot
    pub shipping_name: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    pub shipping_phone: Option<String>,

    // Totals; total_cents = subtotal_cents + shipping_cents + tax_cents
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,

    pub payment_method: PaymentMethod,
    /// Provider-side reference (intent id), set at creation or by webhook.
    pub payment_reference: Option<String>,

    /// Carrier tracking number, persisted on the transition into `shipped`.
    pub tracking_number: Option<String>,
    /// Set exactly once, by the payment-succeeded webhook.
    pub paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn shipping_cost(&self) -> Money {
        Money::from_cents(self.shipping_cents)
    }

    #[inline]
    pub fn tax(&self) -> Money {
        Money::from_cents(self.tax_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// An immutable snapshot of one cart line at the moment of purchase.
///
/// Name and price are copied, never referenced: if the product is renamed,
/// repriced or deleted next week, this line still shows what the customer
/// actually bought.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,

    /// Product name at time of purchase (frozen).
    pub product_name: String,
    /// Variant name at time of purchase (frozen).
    pub variant_name: Option<String>,
    /// Unit price in cents at time of purchase (frozen).
    pub unit_price_cents: i64,

    pub quantity: i64,
    /// unit_price × quantity, frozen.
    pub line_total_cents: i64,

    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    /// Returns the stock-keeping unit to restore on cancellation.
    pub fn sku_ref(&self) -> SkuRef {
        match &self.variant_id {
            Some(variant) => SkuRef::Variant(variant.clone()),
            None => SkuRef::Product(self.product_id.clone()),
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
