//! # atrium-db: Database Layer for the Atrium Storefront
//!
//! This crate owns every database transaction in the system: the stock
//! ledger, cart persistence, and the order workflow.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Atrium Checkout Data Flow                          │
//! │                                                                         │
//! │  Web layer (external)                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     atrium-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │   Database    │   │  Repositories  │   │  Migrations   │  │   │
//! │  │   │   (pool.rs)   │   │ StockLedger    │   │  (embedded)   │  │   │
//! │  │   │               │   │ CartRepository │   │               │  │   │
//! │  │   │ WAL + busy    │◄──│ OrderWorkflow  │   │ 0001_init.sql │  │   │
//! │  │   │ timeout       │   │ ProductRepo    │   │               │  │   │
//! │  │   └───────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  One shared SQLite database - StockUnit rows are the only resource     │
//! │  mutated by more than one logical operation, and only the ledger       │
//! │  may touch them.                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`config`] - Checkout configuration (tax, prefix, window, shipping)
//! - [`notify`] - Fire-and-forget status-transition notifications
//! - [`error`] - Storage errors and the domain/storage union
//! - [`repository`] - Stock ledger, carts, orders, catalog reads
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atrium_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("store.db")).await?;
//!
//! let cart = db.carts().get_or_create(&identity).await?;
//! db.carts().add_line(&cart.id, &product_id, None, 2).await?;
//!
//! let order = db
//!     .orders()
//!     .create(&user_id, &cart.id, &shipping, PaymentMethod::Card, None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod notify;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CheckoutConfig, ConfigError};
pub use error::{DbError, DbResult, StoreError, StoreResult};
pub use notify::{NoopNotifier, NotifyError, OrderNotifier};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::order::OrderWorkflow;
pub use repository::product::ProductRepository;
pub use repository::stock::StockLedger;
