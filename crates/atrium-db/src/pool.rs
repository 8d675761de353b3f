//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Concurrency Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Request-per-call Concurrency                          │
//! │                                                                         │
//! │  Many web requests ──► pool connections ──► one shared SQLite file     │
//! │                                                                         │
//! │  WAL mode:     readers never block writers and vice versa              │
//! │  busy timeout: concurrent checkout transactions QUEUE on the write     │
//! │                lock instead of failing; correctness over latency on    │
//! │                a hot SKU is intentional                                │
//! │  foreign keys: ON (SQLite ships with them off)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use moka::future::Cache;

use crate::config::CheckoutConfig;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::notify::{NoopNotifier, OrderNotifier};
use crate::repository::cart::{CartRepository, CartTotalsCache};
use crate::repository::order::OrderWorkflow;
use crate::repository::product::ProductRepository;
use crate::repository::stock::StockLedger;

/// How long a cached cart total may be served before recomputation.
///
/// The cache is best-effort: every cart mutation invalidates its key
/// synchronously, so the TTL only bounds staleness across processes.
const CART_TOTAL_TTL: Duration = Duration::from_secs(60);

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/atrium/store.db")
///     .max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    pub min_connections: u32,

    /// Timeout when acquiring a pool connection.
    pub acquire_timeout: Duration,

    /// How long a writer waits on SQLite's write lock before giving up.
    /// Checkout transactions on a hot SKU queue here.
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 8,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the busy timeout for contended write locks.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates a throwaway database configuration for tests.
    ///
    /// Uses a uniquely named file in the system temp directory rather than
    /// `:memory:` because the concurrency tests need several connections
    /// looking at the same database.
    pub fn ephemeral() -> Self {
        let path = std::env::temp_dir().join(format!("atrium-{}.db", uuid::Uuid::new_v4()));
        DbConfig::new(path)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// ## Design
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Database                                                               │
/// │  ├── pool            shared SqlitePool                                  │
/// │  ├── totals_cache    moka cache shared by every CartRepository clone    │
/// │  ├── checkout        CheckoutConfig (tax, prefix, window, shipping)     │
/// │  └── notifier        fire-and-forget status-transition notifier         │
/// │                                                                         │
/// │  db.products()  →  ProductRepository   (catalog reads + seeding)        │
/// │  db.stock()     →  StockLedger         (the only stock mutator)         │
/// │  db.carts()     →  CartRepository      (basket + totals cache)          │
/// │  db.orders()    →  OrderWorkflow       (create / cancel / status)       │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    totals_cache: CartTotalsCache,
    checkout: CheckoutConfig,
    notifier: Arc<dyn OrderNotifier>,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite for concurrent checkouts:
    ///    - WAL mode, NORMAL synchronous
    ///    - busy timeout so contended writers queue
    ///    - foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path?mode=rwc creates the file if missing
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout)
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            totals_cache: Cache::builder()
                .time_to_live(CART_TOTAL_TTL)
                .max_capacity(10_000)
                .build(),
            checkout: CheckoutConfig::default(),
            notifier: Arc::new(NoopNotifier),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Replaces the checkout configuration (tax rate, order prefix,
    /// cancellation window, shipping tiers).
    pub fn with_checkout(mut self, checkout: CheckoutConfig) -> Self {
        self.checkout = checkout;
        self
    }

    /// Replaces the status-transition notifier.
    ///
    /// The default is a no-op; the web layer installs the real sender.
    pub fn with_notifier(mut self, notifier: Arc<dyn OrderNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Runs database migrations.
    ///
    /// Idempotent: applied migrations are tracked in `_sqlx_migrations`.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For advanced queries not covered by repositories. Prefer repository
    /// methods when available.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the catalog read-side repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the stock ledger, the single source of truth for sellable
    /// quantity.
    pub fn stock(&self) -> StockLedger {
        StockLedger::new(self.pool.clone())
    }

    /// Returns the cart repository.
    pub fn carts(&self) -> CartRepository {
        CartRepository::new(self.pool.clone(), self.totals_cache.clone())
    }

    /// Returns the order workflow.
    pub fn orders(&self) -> OrderWorkflow {
        OrderWorkflow::new(
            self.pool.clone(),
            self.checkout.clone(),
            self.notifier.clone(),
            self.totals_cache.clone(),
        )
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ephemeral_database_migrates_and_responds() {
        let db = Database::new(DbConfig::ephemeral()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[test]
    fn config_builder() {
        let config = DbConfig::new("/tmp/atrium-test.db")
            .max_connections(12)
            .min_connections(2)
            .busy_timeout(Duration::from_secs(1));

        assert_eq!(config.max_connections, 12);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
    }
}
