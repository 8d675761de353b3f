//! # Stock Ledger
//!
//! The single source of truth for sellable quantity. Every stock mutation
//! in the system goes through this module; no other code is allowed to
//! read-then-write `stock_units.quantity`.
//!
//! ## The No-Oversell Guarantee
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ❌ WRONG: read-then-write (racy)                                      │
//! │     let q = SELECT quantity ...            ← two callers read 5        │
//! │     if q >= wanted { UPDATE ... q-wanted } ← both decrement, stock -3! │
//! │                                                                         │
//! │  ✅ CORRECT: conditional update (atomic)                               │
//! │     UPDATE stock_units                                                  │
//! │     SET quantity = quantity - ?wanted                                   │
//! │     WHERE ... AND quantity >= ?wanted                                   │
//! │                                                                         │
//! │     The check and the decrement are one statement. SQLite serializes   │
//! │     writers, so of two concurrent reservations on the same SKU one     │
//! │     wins and the other sees rows_affected == 0 → InsufficientStock.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reservations compose: the order workflow calls the `*_in_tx` variants
//! against its own transaction so that N reservations, the order insert and
//! the cart destruction commit or roll back as one unit.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, StoreResult};
use atrium_core::{CoreError, SkuRef};

/// The stock ledger.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    /// Creates a new StockLedger.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Returns the quantity currently on hand for a SKU.
    ///
    /// A missing stock row reads as zero: a SKU nobody has stocked is a
    /// SKU nobody can buy.
    pub async fn quantity_on_hand(&self, sku: &SkuRef) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::quantity_on_hand_in_tx(&mut conn, sku).await
    }

    /// Non-locking availability check: `quantity_on_hand >= requested`.
    ///
    /// This is advisory only - the answer can be stale by the time the
    /// caller acts on it. The binding check is the conditional update in
    /// [`reserve`](Self::reserve).
    pub async fn check_availability(&self, sku: &SkuRef, requested: i64) -> DbResult<bool> {
        Ok(self.quantity_on_hand(sku).await? >= requested)
    }

    /// Atomically reserves `quantity` units of a SKU.
    ///
    /// Fails with `InsufficientStock { available, requested }` when the
    /// counter holds fewer units than requested; on failure nothing is
    /// decremented.
    pub async fn reserve(&self, sku: &SkuRef, quantity: i64) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::reserve_in_tx(&mut conn, sku, quantity).await
    }

    /// Atomically returns `quantity` units of a SKU to stock.
    ///
    /// Used on cancellation. There is no upper bound check - returned
    /// stock is trusted.
    pub async fn restore(&self, sku: &SkuRef, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::restore_in_tx(&mut conn, sku, quantity).await
    }

    /// Sets the absolute quantity for a SKU, creating the stock row if
    /// needed (admin/receiving path - still ledger-only mutation).
    pub async fn set_quantity(&self, sku: &SkuRef, quantity: i64) -> DbResult<()> {
        debug!(sku = %sku, quantity, "Setting stock level");

        let now = Utc::now();
        let existing: Option<String> = sqlx::query_scalar(match sku {
            SkuRef::Product(_) => "SELECT id FROM stock_units WHERE product_id = ?1",
            SkuRef::Variant(_) => "SELECT id FROM stock_units WHERE variant_id = ?1",
        })
        .bind(sku.id())
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(id) => {
                sqlx::query("UPDATE stock_units SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
                    .bind(&id)
                    .bind(quantity)
                    .bind(now)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                let (product_id, variant_id) = match sku {
                    SkuRef::Product(id) => (Some(id.as_str()), None),
                    SkuRef::Variant(id) => (None, Some(id.as_str())),
                };
                sqlx::query(
                    r#"
                    INSERT INTO stock_units (id, product_id, variant_id, quantity, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                )
                .bind(uuid::Uuid::new_v4().to_string())
                .bind(product_id)
                .bind(variant_id)
                .bind(quantity)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    // =========================================================================
    // In-transaction variants
    // =========================================================================
    // These take a raw connection so the order workflow can run several
    // reservations (and the restores on cancellation) inside its own
    // transaction boundary.

    /// Reads the quantity on hand through an existing connection.
    pub(crate) async fn quantity_on_hand_in_tx(
        conn: &mut SqliteConnection,
        sku: &SkuRef,
    ) -> DbResult<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(match sku {
            SkuRef::Product(_) => "SELECT quantity FROM stock_units WHERE product_id = ?1",
            SkuRef::Variant(_) => "SELECT quantity FROM stock_units WHERE variant_id = ?1",
        })
        .bind(sku.id())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// The atomic reserve: check and decrement in one statement.
    pub(crate) async fn reserve_in_tx(
        conn: &mut SqliteConnection,
        sku: &SkuRef,
        quantity: i64,
    ) -> StoreResult<()> {
        debug!(sku = %sku, quantity, "Reserving stock");

        let result = sqlx::query(match sku {
            SkuRef::Product(_) => {
                r#"
                UPDATE stock_units
                SET quantity = quantity - ?2, updated_at = ?3
                WHERE product_id = ?1 AND quantity >= ?2
                "#
            }
            SkuRef::Variant(_) => {
                r#"
                UPDATE stock_units
                SET quantity = quantity - ?2, updated_at = ?3
                WHERE variant_id = ?1 AND quantity >= ?2
                "#
            }
        })
        .bind(sku.id())
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let available = Self::quantity_on_hand_in_tx(conn, sku).await?;
            return Err(CoreError::InsufficientStock {
                sku: sku.to_string(),
                available,
                requested: quantity,
            }
            .into());
        }

        Ok(())
    }

    /// The atomic restore: unconditional increment.
    pub(crate) async fn restore_in_tx(
        conn: &mut SqliteConnection,
        sku: &SkuRef,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(sku = %sku, quantity, "Restoring stock");

        let result = sqlx::query(match sku {
            SkuRef::Product(_) => {
                r#"
                UPDATE stock_units
                SET quantity = quantity + ?2, updated_at = ?3
                WHERE product_id = ?1
                "#
            }
            SkuRef::Variant(_) => {
                r#"
                UPDATE stock_units
                SET quantity = quantity + ?2, updated_at = ?3
                WHERE variant_id = ?1
                "#
            }
        })
        .bind(sku.id())
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockUnit", sku.id()));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use atrium_core::{CoreError, Product};
    use chrono::Utc;

    async fn db_with_sku(stock: i64) -> (Database, SkuRef) {
        let db = Database::new(DbConfig::ephemeral()).await.unwrap();
        let now = Utc::now();
        let product = Product {
            id: "p-1".to_string(),
            sku: "MUG-CLASSIC".to_string(),
            name: "Classic Mug".to_string(),
            description: None,
            price_cents: 1299,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert_product(&product).await.unwrap();

        let sku = SkuRef::Product(product.id);
        db.stock().set_quantity(&sku, stock).await.unwrap();
        (db, sku)
    }

    #[tokio::test]
    async fn reserve_decrements() {
        let (db, sku) = db_with_sku(10).await;
        let ledger = db.stock();

        ledger.reserve(&sku, 3).await.unwrap();
        assert_eq!(ledger.quantity_on_hand(&sku).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn reserve_rejects_insufficient_stock_without_decrementing() {
        let (db, sku) = db_with_sku(2).await;
        let ledger = db.stock();

        let err = ledger.reserve(&sku, 3).await.unwrap_err();
        match err.as_domain() {
            Some(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(*available, 2);
                assert_eq!(*requested, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(ledger.quantity_on_hand(&sku).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn restore_increments() {
        let (db, sku) = db_with_sku(5).await;
        let ledger = db.stock();

        ledger.reserve(&sku, 5).await.unwrap();
        assert_eq!(ledger.quantity_on_hand(&sku).await.unwrap(), 0);

        ledger.restore(&sku, 5).await.unwrap();
        assert_eq!(ledger.quantity_on_hand(&sku).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn missing_stock_row_reads_as_zero() {
        let (db, _) = db_with_sku(1).await;
        let ledger = db.stock();

        let ghost = SkuRef::Variant("no-such-variant".to_string());
        assert_eq!(ledger.quantity_on_hand(&ghost).await.unwrap(), 0);
        assert!(!ledger.check_availability(&ghost, 1).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_reservations_never_oversell() {
        // 10 units, 4 callers each wanting 3: exactly 3 can win.
        let (db, sku) = db_with_sku(10).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let ledger = db.stock();
            let sku = sku.clone();
            handles.push(tokio::spawn(
                async move { ledger.reserve(&sku, 3).await },
            ));
        }

        let mut successes = 0;
        let mut stock_errors = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(err) => {
                    assert!(matches!(
                        err.as_domain(),
                        Some(CoreError::InsufficientStock { .. })
                    ));
                    stock_errors += 1;
                }
            }
        }

        assert_eq!(successes, 3);
        assert_eq!(stock_errors, 1);

        let remaining = db.stock().quantity_on_hand(&sku).await.unwrap();
        assert_eq!(remaining, 1);
        assert!(remaining >= 0);
    }
}
