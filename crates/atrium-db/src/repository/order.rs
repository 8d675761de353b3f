//! # Order Workflow
//!
//! The central state machine: converts a mutable cart into an immutable
//! order while guaranteeing that stock is never oversold, that totals are
//! internally consistent, and that partial failures leave no observable
//! side effect.
//!
//! ## The Creation Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    create() - one transaction                           │
//! │                                                                         │
//! │  outside txn:  load cart lines, re-validate availability, price        │
//! │                lines, compute totals, sort lines by SKU                 │
//! │       │                                                                 │
//! │       ▼        BEGIN                                                    │
//! │  1. reserve SKU #1  ──┐                                                 │
//! │  2. reserve SKU #2    │  conditional updates, sorted SKU order          │
//! │  3. reserve SKU #N  ──┘  (any failure → ROLLBACK, nothing visible)     │
//! │  4. allocate order number (per-year counter row)                        │
//! │  5. insert order (status = pending)                                     │
//! │  6. insert one snapshot line per cart line                              │
//! │  7. destroy the cart                                                    │
//! │                COMMIT                                                   │
//! │                                                                         │
//! │  The sorted reservation order means two orders competing for           │
//! │  overlapping SKUs always lock in the same sequence - no deadlock by    │
//! │  opposite acquisition order.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transaction issues only writes; every read happens before BEGIN.
//! Pre-read data is used for pricing and snapshots, but never for the
//! stock decision - the conditional update re-checks the counter at write
//! time, which is what the no-oversell property rests on.
//!
//! ## Status Transitions
//! Legality lives on `OrderStatus::can_transition_to`; this module only
//! enforces it, with a status-guarded UPDATE so a concurrent transition
//! cannot be overwritten. Cancellation restores stock in the same
//! transaction as the status flip, so a crash between the two can never
//! leave stock under-counted.

use std::sync::Arc;

use chrono::{Datelike, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CheckoutConfig;
use crate::error::{DbResult, StoreResult};
use crate::notify::{notify_transition, OrderNotifier};
use crate::repository::cart::CartTotalsCache;
use crate::repository::product::{LinePricing, ProductRepository};
use crate::repository::stock::StockLedger;
use atrium_core::{
    validation::validate_shipping, CartLine, CoreError, Money, Order, OrderLine, OrderStatus,
    PaymentMethod, ShippingInfo,
};

/// A cart line joined with its pricing, ready to be reserved and frozen.
struct PreparedLine {
    line: CartLine,
    pricing: LinePricing,
}

impl PreparedLine {
    fn line_total_cents(&self) -> i64 {
        self.pricing.unit_price_cents * self.line.quantity
    }
}

/// The order workflow.
#[derive(Clone)]
pub struct OrderWorkflow {
    pool: SqlitePool,
    config: CheckoutConfig,
    notifier: Arc<dyn OrderNotifier>,
    totals_cache: CartTotalsCache,
}

impl OrderWorkflow {
    /// Creates a new OrderWorkflow.
    pub fn new(
        pool: SqlitePool,
        config: CheckoutConfig,
        notifier: Arc<dyn OrderNotifier>,
        totals_cache: CartTotalsCache,
    ) -> Self {
        OrderWorkflow {
            pool,
            config,
            notifier,
            totals_cache,
        }
    }

    fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates an order from a cart.
    ///
    /// ## Failure Modes
    /// - `EmptyCart` when the cart has no lines
    /// - `InvalidShipping` when a required shipping field is missing
    /// - `Unavailable` when a product was deactivated since it was added
    /// - `InsufficientStock` when any reservation fails - in which case
    ///   every earlier reservation is rolled back, the cart is untouched
    ///   and no order row exists
    pub async fn create(
        &self,
        user_id: &str,
        cart_id: &str,
        shipping: &ShippingInfo,
        payment_method: PaymentMethod,
        payment_reference: Option<&str>,
    ) -> StoreResult<Order> {
        debug!(user_id = %user_id, cart_id = %cart_id, "Creating order");

        let lines = self.cart_lines(cart_id).await?;
        if lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        validate_shipping(shipping)?;

        // Re-validate availability and price every line at purchase time.
        let products = self.products();
        let mut prepared = Vec::with_capacity(lines.len());
        for line in lines {
            let pricing = products
                .line_pricing(&line.product_id, line.variant_id.as_deref())
                .await?;
            ProductRepository::ensure_sellable(&pricing)?;
            prepared.push(PreparedLine { line, pricing });
        }

        // Stable SKU order: overlapping orders acquire row locks in the
        // same sequence.
        prepared.sort_by(|a, b| a.pricing.sku_ref.cmp(&b.pricing.sku_ref));

        let subtotal: Money = prepared
            .iter()
            .map(|p| Money::from_cents(p.line_total_cents()))
            .sum();
        let shipping_cost = self.config.shipping.cost_for(&shipping.country);
        let tax = subtotal.calculate_tax(self.config.tax_rate());
        let total = subtotal + shipping_cost + tax;

        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        for p in &prepared {
            StockLedger::reserve_in_tx(&mut tx, &p.pricing.sku_ref, p.line.quantity).await?;
        }

        let order_number =
            Self::allocate_order_number(&mut tx, &self.config.order_prefix).await?;

        let order = Order {
            id: order_id.clone(),
            order_number,
            user_id: user_id.to_string(),
            status: OrderStatus::Pending,
            shipping_name: shipping.name.clone(),
            shipping_address: shipping.address.clone(),
            shipping_city: shipping.city.clone(),
            shipping_postal_code: shipping.postal_code.clone(),
            shipping_country: shipping.country.clone(),
            shipping_phone: shipping.phone.clone(),
            subtotal_cents: subtotal.cents(),
            shipping_cents: shipping_cost.cents(),
            tax_cents: tax.cents(),
            total_cents: total.cents(),
            payment_method,
            payment_reference: payment_reference.map(str::to_string),
            tracking_number: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, user_id, status,
                shipping_name, shipping_address, shipping_city,
                shipping_postal_code, shipping_country, shipping_phone,
                subtotal_cents, shipping_cents, tax_cents, total_cents,
                payment_method, payment_reference, tracking_number, paid_at,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18,
                ?19, ?20
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(&order.shipping_name)
        .bind(&order.shipping_address)
        .bind(&order.shipping_city)
        .bind(&order.shipping_postal_code)
        .bind(&order.shipping_country)
        .bind(&order.shipping_phone)
        .bind(order.subtotal_cents)
        .bind(order.shipping_cents)
        .bind(order.tax_cents)
        .bind(order.total_cents)
        .bind(order.payment_method)
        .bind(&order.payment_reference)
        .bind(&order.tracking_number)
        .bind(order.paid_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for p in &prepared {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    id, order_id, product_id, variant_id,
                    product_name, variant_name, unit_price_cents,
                    quantity, line_total_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order.id)
            .bind(&p.line.product_id)
            .bind(&p.line.variant_id)
            .bind(&p.pricing.product_name)
            .bind(&p.pricing.variant_name)
            .bind(p.pricing.unit_price_cents)
            .bind(p.line.quantity)
            .bind(p.line_total_cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // Successful order creation destroys the cart (lines cascade).
        sqlx::query("DELETE FROM carts WHERE id = ?1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.totals_cache.invalidate(cart_id).await;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total(),
            lines = prepared.len(),
            "Order created"
        );

        Ok(order)
    }

    /// Allocates the next `PREFIX-YYYY-NNNNNN` number inside the caller's
    /// transaction.
    ///
    /// The per-year counter row is upserted and incremented in a single
    /// statement; SQLite's write lock serializes concurrent allocators,
    /// so numbers are unique absolutely. A later rollback of the caller's
    /// transaction releases the number, leaving a gap - uniqueness is
    /// required, gap-freedom is not.
    async fn allocate_order_number(
        conn: &mut SqliteConnection,
        prefix: &str,
    ) -> DbResult<String> {
        let year = Utc::now().year();

        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_sequences (year, next_seq) VALUES (?1, 1)
            ON CONFLICT(year) DO UPDATE SET next_seq = next_seq + 1
            RETURNING next_seq
            "#,
        )
        .bind(year)
        .fetch_one(&mut *conn)
        .await?;

        Ok(format!("{prefix}-{year}-{seq:06}"))
    }

    // =========================================================================
    // Status transitions
    // =========================================================================

    /// Moves an order to a new status.
    ///
    /// `tracking_number` is persisted only on the transition into
    /// `shipped`. A notification is dispatched after the change commits;
    /// its failure is logged and never rolls back the transition.
    pub async fn update_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        tracking_number: Option<&str>,
    ) -> StoreResult<Order> {
        let order = self.require(order_id).await?;

        if !order.status.can_transition_to(new_status) {
            return Err(CoreError::InvalidTransition {
                from: order.status,
                to: new_status,
            }
            .into());
        }

        let now = Utc::now();
        let result = if new_status == OrderStatus::Shipped {
            sqlx::query(
                r#"
                UPDATE orders
                SET status = ?2, tracking_number = ?3, updated_at = ?4
                WHERE id = ?1 AND status = ?5
                "#,
            )
            .bind(order_id)
            .bind(new_status)
            .bind(tracking_number)
            .bind(now)
            .bind(order.status)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE orders
                SET status = ?2, updated_at = ?3
                WHERE id = ?1 AND status = ?4
                "#,
            )
            .bind(order_id)
            .bind(new_status)
            .bind(now)
            .bind(order.status)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            // Lost a race: someone moved the order first. Report against
            // the fresh state.
            let current = self.require(order_id).await?;
            return Err(CoreError::InvalidTransition {
                from: current.status,
                to: new_status,
            }
            .into());
        }

        let updated = self.require(order_id).await?;
        info!(order_id = %order_id, from = %order.status, to = %new_status, "Order status updated");

        notify_transition(self.notifier.as_ref(), &updated, new_status).await;

        Ok(updated)
    }

    /// Cancels an order and restores its stock.
    ///
    /// ## Guards
    /// - `AlreadyCancelled` / `AlreadyShippedOrDelivered` by current status
    /// - `CancellationWindowExpired` past the configured window
    ///
    /// The status flip and every restore run in one transaction, and the
    /// flip is status-guarded: of two concurrent cancels exactly one
    /// restores stock.
    pub async fn cancel(&self, order_id: &str) -> StoreResult<Order> {
        let order = self.require(order_id).await?;

        match order.status {
            OrderStatus::Cancelled => {
                return Err(CoreError::AlreadyCancelled(order_id.to_string()).into())
            }
            OrderStatus::Shipped | OrderStatus::Delivered => {
                return Err(CoreError::AlreadyShippedOrDelivered(order_id.to_string()).into())
            }
            OrderStatus::Pending | OrderStatus::Processing => {}
        }

        let window = Duration::hours(self.config.cancellation_window_hours);
        if Utc::now() - order.created_at > window {
            return Err(CoreError::CancellationWindowExpired {
                order_id: order_id.to_string(),
                hours: self.config.cancellation_window_hours,
            }
            .into());
        }

        let lines = self.lines(order_id).await?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'cancelled', updated_at = ?2
            WHERE id = ?1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if flipped.rows_affected() == 0 {
            // A concurrent cancel (or shipment) won; classify from the
            // fresh state and restore nothing.
            drop(tx);
            let current = self.require(order_id).await?;
            return Err(match current.status {
                OrderStatus::Cancelled => CoreError::AlreadyCancelled(order_id.to_string()),
                _ => CoreError::AlreadyShippedOrDelivered(order_id.to_string()),
            }
            .into());
        }

        for line in &lines {
            StockLedger::restore_in_tx(&mut tx, &line.sku_ref(), line.quantity).await?;
        }

        tx.commit().await?;

        let updated = self.require(order_id).await?;
        info!(order_id = %order_id, lines = lines.len(), "Order cancelled, stock restored");

        Ok(updated)
    }

    /// Records a confirmed payment, advancing `pending → processing` and
    /// setting `paid_at` exactly once.
    ///
    /// Payment providers redeliver webhooks; a replay for an already-paid
    /// order returns the order unchanged.
    pub async fn mark_paid(
        &self,
        order_id: &str,
        payment_reference: Option<&str>,
    ) -> StoreResult<Order> {
        let order = self.require(order_id).await?;

        if order.paid_at.is_some() {
            debug!(order_id = %order_id, "Duplicate payment webhook ignored");
            return Ok(order);
        }

        let now = Utc::now();
        let transitioned = if order.status == OrderStatus::Pending {
            let result = sqlx::query(
                r#"
                UPDATE orders
                SET status = 'processing',
                    paid_at = ?2,
                    payment_reference = COALESCE(?3, payment_reference),
                    updated_at = ?2
                WHERE id = ?1 AND status = 'pending' AND paid_at IS NULL
                "#,
            )
            .bind(order_id)
            .bind(now)
            .bind(payment_reference)
            .execute(&self.pool)
            .await?;
            result.rows_affected() > 0
        } else {
            // Already moved on (e.g. cancelled meanwhile): record the
            // payment timestamp without touching the state machine.
            sqlx::query(
                r#"
                UPDATE orders
                SET paid_at = ?2,
                    payment_reference = COALESCE(?3, payment_reference),
                    updated_at = ?2
                WHERE id = ?1 AND paid_at IS NULL
                "#,
            )
            .bind(order_id)
            .bind(now)
            .bind(payment_reference)
            .execute(&self.pool)
            .await?;
            false
        };

        let updated = self.require(order_id).await?;

        if transitioned {
            info!(order_id = %order_id, "Payment confirmed, order processing");
            notify_transition(self.notifier.as_ref(), &updated, OrderStatus::Processing).await;
        }

        Ok(updated)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order by ID.
    pub async fn get(&self, order_id: &str) -> DbResult<Option<Order>> {
        Ok(sqlx::query_as::<_, Order>(
            r#"
            SELECT id, order_number, user_id, status,
                   shipping_name, shipping_address, shipping_city,
                   shipping_postal_code, shipping_country, shipping_phone,
                   subtotal_cents, shipping_cents, tax_cents, total_cents,
                   payment_method, payment_reference, tracking_number, paid_at,
                   created_at, updated_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Gets all orders for a user, newest first.
    pub async fn get_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        Ok(sqlx::query_as::<_, Order>(
            r#"
            SELECT id, order_number, user_id, status,
                   shipping_name, shipping_address, shipping_city,
                   shipping_postal_code, shipping_country, shipping_phone,
                   subtotal_cents, shipping_cents, tax_cents, total_cents,
                   payment_method, payment_reference, tracking_number, paid_at,
                   created_at, updated_at
            FROM orders
            WHERE user_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Gets the snapshot lines of an order.
    pub async fn lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        Ok(sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT id, order_id, product_id, variant_id,
                   product_name, variant_name, unit_price_cents,
                   quantity, line_total_cents, created_at
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn require(&self, order_id: &str) -> StoreResult<Order> {
        Ok(self
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?)
    }

    async fn cart_lines(&self, cart_id: &str) -> StoreResult<Vec<CartLine>> {
        // Existence first so an unknown cart reads as CartNotFound rather
        // than EmptyCart.
        let cart: Option<String> = sqlx::query_scalar("SELECT id FROM carts WHERE id = ?1")
            .bind(cart_id)
            .fetch_optional(&self.pool)
            .await?;
        if cart.is_none() {
            return Err(CoreError::CartNotFound(cart_id.to_string()).into());
        }

        Ok(sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, cart_id, product_id, variant_id, quantity, created_at, updated_at
            FROM cart_lines
            WHERE cart_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
