//! # Cart Repository
//!
//! The mutable pre-purchase basket: persistence, business checks, and the
//! totals cache.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Lifecycle                                   │
//! │                                                                         │
//! │  first add ──► get_or_create(identity) ──► cart row                    │
//! │                                                                         │
//! │  add_line / update_quantity / remove_line  (stock-checked mutations)   │
//! │                                                                         │
//! │  destroyed by ──┬── successful order creation (inside that txn)        │
//! │                 ├── explicit clear()                                    │
//! │                 └── merge_on_login() for the guest cart                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Checks Account For The Whole Line
//! Adding 2 units to a line that already holds 3 needs 5 units available,
//! not 2. The check runs against the ledger's live counter; the binding
//! reservation happens later, at checkout.
//!
//! ## Totals Cache
//! `calculate_total` is read-through cached per cart id with a short TTL.
//! Every mutation invalidates the key synchronously. Losing the cache can
//! only cost a recompute, never a wrong total.

use chrono::Utc;
use moka::future::Cache;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, StoreResult};
use crate::repository::product::ProductRepository;
use crate::repository::stock::StockLedger;
use atrium_core::{
    validation::validate_line_quantity, Cart, CartIdentity, CartLine, CoreError, Money,
    MAX_LINE_QUANTITY,
};

/// Cart id → total cents. Shared by every repository clone on a Database.
pub type CartTotalsCache = Cache<String, i64>;

/// Repository for cart operations.
#[derive(Clone)]
pub struct CartRepository {
    pool: SqlitePool,
    totals_cache: CartTotalsCache,
}

impl CartRepository {
    /// Creates a new CartRepository sharing the database's totals cache.
    pub fn new(pool: SqlitePool, totals_cache: CartTotalsCache) -> Self {
        CartRepository { pool, totals_cache }
    }

    fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    fn stock(&self) -> StockLedger {
        StockLedger::new(self.pool.clone())
    }

    // =========================================================================
    // Cart rows
    // =========================================================================

    /// Returns the unique cart for an identity, creating it if absent.
    pub async fn get_or_create(&self, identity: &CartIdentity) -> DbResult<Cart> {
        if let Some(cart) = self.find_by_identity(identity).await? {
            return Ok(cart);
        }

        let now = Utc::now();
        let (user_id, session_key) = match identity {
            CartIdentity::User(id) => (Some(id.as_str()), None),
            CartIdentity::Session(key) => (None, Some(key.as_str())),
        };

        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            session_key: session_key.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, session_key, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(&cart.session_key)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                debug!(cart_id = %cart.id, "Cart created");
                Ok(cart)
            }
            // Lost a create race for the same identity: the other caller's
            // cart is the unique one, use it.
            Err(err) => match DbError::from(err) {
                DbError::UniqueViolation { .. } => self
                    .find_by_identity(identity)
                    .await?
                    .ok_or_else(|| DbError::not_found("Cart", "by identity")),
                other => Err(other),
            },
        }
    }

    /// Finds a cart by its owning identity.
    pub async fn find_by_identity(&self, identity: &CartIdentity) -> DbResult<Option<Cart>> {
        let (sql, key) = match identity {
            CartIdentity::User(id) => (
                "SELECT id, user_id, session_key, created_at, updated_at
                 FROM carts WHERE user_id = ?1",
                id,
            ),
            CartIdentity::Session(key) => (
                "SELECT id, user_id, session_key, created_at, updated_at
                 FROM carts WHERE session_key = ?1",
                key,
            ),
        };

        Ok(sqlx::query_as::<_, Cart>(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Gets a cart by ID.
    pub async fn get(&self, cart_id: &str) -> DbResult<Option<Cart>> {
        Ok(sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, session_key, created_at, updated_at FROM carts WHERE id = ?1",
        )
        .bind(cart_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Gets all lines of a cart.
    pub async fn lines(&self, cart_id: &str) -> DbResult<Vec<CartLine>> {
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

    /// Gets one line by ID.
    pub async fn get_line(&self, line_id: &str) -> DbResult<Option<CartLine>> {
        Ok(sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, cart_id, product_id, variant_id, quantity, created_at, updated_at
            FROM cart_lines
            WHERE id = ?1
            "#,
        )
        .bind(line_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Finds the line for a (cart, product, variant) triple.
    ///
    /// COALESCE mirrors the unique index: a NULL variant is one identity,
    /// not infinitely many.
    async fn find_line(
        &self,
        cart_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<Option<CartLine>> {
        Ok(sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, cart_id, product_id, variant_id, quantity, created_at, updated_at
            FROM cart_lines
            WHERE cart_id = ?1
              AND product_id = ?2
              AND COALESCE(variant_id, '') = COALESCE(?3, '')
            "#,
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Adds a SKU to the cart, merging into an existing line.
    ///
    /// ## Checks, in order
    /// 1. requested quantity within 1..=100
    /// 2. product active / variant available (`Unavailable`)
    /// 3. merged line quantity within the per-order cap
    /// 4. merged line quantity covered by stock on hand
    ///    (`InsufficientStock` - the check counts what is already in the
    ///    line, not just the delta)
    pub async fn add_line(
        &self,
        cart_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> StoreResult<CartLine> {
        validate_line_quantity(quantity).map_err(CoreError::from)?;

        let cart = self
            .get(cart_id)
            .await?
            .ok_or_else(|| CoreError::CartNotFound(cart_id.to_string()))?;

        let pricing = self.products().line_pricing(product_id, variant_id).await?;
        ProductRepository::ensure_sellable(&pricing)?;

        let existing = self.find_line(&cart.id, product_id, variant_id).await?;
        let merged_quantity = existing.as_ref().map_or(0, |l| l.quantity) + quantity;

        if merged_quantity > MAX_LINE_QUANTITY {
            return Err(CoreError::from(
                atrium_core::ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: atrium_core::MIN_LINE_QUANTITY,
                    max: MAX_LINE_QUANTITY,
                },
            )
            .into());
        }

        let available = self.stock().quantity_on_hand(&pricing.sku_ref).await?;
        if available < merged_quantity {
            return Err(CoreError::InsufficientStock {
                sku: pricing.sku_code,
                available,
                requested: merged_quantity,
            }
            .into());
        }

        let now = Utc::now();
        let line = match existing {
            Some(mut line) => {
                sqlx::query("UPDATE cart_lines SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
                    .bind(&line.id)
                    .bind(merged_quantity)
                    .bind(now)
                    .execute(&self.pool)
                    .await?;
                line.quantity = merged_quantity;
                line.updated_at = now;
                line
            }
            None => {
                let line = CartLine {
                    id: Uuid::new_v4().to_string(),
                    cart_id: cart.id.clone(),
                    product_id: product_id.to_string(),
                    variant_id: variant_id.map(str::to_string),
                    quantity,
                    created_at: now,
                    updated_at: now,
                };
                sqlx::query(
                    r#"
                    INSERT INTO cart_lines (id, cart_id, product_id, variant_id, quantity,
                                            created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )
                .bind(&line.id)
                .bind(&line.cart_id)
                .bind(&line.product_id)
                .bind(&line.variant_id)
                .bind(line.quantity)
                .bind(line.created_at)
                .bind(line.updated_at)
                .execute(&self.pool)
                .await?;
                line
            }
        };

        self.invalidate_total(&cart.id).await;
        debug!(cart_id = %cart.id, line_id = %line.id, quantity = line.quantity, "Cart line upserted");

        Ok(line)
    }

    /// Replaces the quantity of a line (not additive).
    ///
    /// Same bounds and stock checks as [`add_line`](Self::add_line), with
    /// the new quantity replacing the old in the stock comparison.
    pub async fn update_quantity(&self, line_id: &str, quantity: i64) -> StoreResult<CartLine> {
        validate_line_quantity(quantity).map_err(CoreError::from)?;

        let mut line = self
            .get_line(line_id)
            .await?
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))?;

        let pricing = self
            .products()
            .line_pricing(&line.product_id, line.variant_id.as_deref())
            .await?;
        ProductRepository::ensure_sellable(&pricing)?;

        let available = self.stock().quantity_on_hand(&pricing.sku_ref).await?;
        if available < quantity {
            return Err(CoreError::InsufficientStock {
                sku: pricing.sku_code,
                available,
                requested: quantity,
            }
            .into());
        }

        let now = Utc::now();
        sqlx::query("UPDATE cart_lines SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(&line.id)
            .bind(quantity)
            .bind(now)
            .execute(&self.pool)
            .await?;

        line.quantity = quantity;
        line.updated_at = now;

        self.invalidate_total(&line.cart_id).await;
        Ok(line)
    }

    /// Removes a line unconditionally.
    pub async fn remove_line(&self, line_id: &str) -> StoreResult<()> {
        let line = self
            .get_line(line_id)
            .await?
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))?;

        sqlx::query("DELETE FROM cart_lines WHERE id = ?1")
            .bind(&line.id)
            .execute(&self.pool)
            .await?;

        self.invalidate_total(&line.cart_id).await;
        Ok(())
    }

    /// Destroys a cart and its lines unconditionally.
    pub async fn clear(&self, cart_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM carts WHERE id = ?1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        self.invalidate_total(cart_id).await;
        debug!(cart_id = %cart_id, "Cart cleared");
        Ok(())
    }

    // =========================================================================
    // Guest merge
    // =========================================================================

    /// Merges a guest cart into the user's cart at login.
    ///
    /// ## Rules
    /// - Matching (product, variant) lines: quantities are SUMMED, then
    ///   clamped to `min(sum, stock on hand, 100)`. Both the per-order
    ///   maximum and physical stock are hard ceilings; whichever is lower
    ///   wins. Stock is read at merge time.
    /// - Unmatched guest lines are reassigned to the user cart as-is.
    /// - The guest cart is destroyed afterwards.
    ///
    /// No stock is decremented here, so no reservation is taken.
    pub async fn merge_on_login(&self, session_key: &str, user_id: &str) -> StoreResult<Cart> {
        let user_cart = self
            .get_or_create(&CartIdentity::User(user_id.to_string()))
            .await?;

        let Some(guest_cart) = self
            .find_by_identity(&CartIdentity::Session(session_key.to_string()))
            .await?
        else {
            return Ok(user_cart);
        };

        let guest_lines = self.lines(&guest_cart.id).await?;
        let now = Utc::now();

        for guest_line in guest_lines {
            let existing = self
                .find_line(
                    &user_cart.id,
                    &guest_line.product_id,
                    guest_line.variant_id.as_deref(),
                )
                .await?;

            match existing {
                Some(user_line) => {
                    let available = self
                        .stock()
                        .quantity_on_hand(&guest_line.sku_ref())
                        .await?;
                    let merged = (user_line.quantity + guest_line.quantity)
                        .min(available)
                        .min(MAX_LINE_QUANTITY);

                    if merged < 1 {
                        // Stock vanished since either cart was filled.
                        sqlx::query("DELETE FROM cart_lines WHERE id = ?1")
                            .bind(&user_line.id)
                            .execute(&self.pool)
                            .await?;
                    } else {
                        sqlx::query(
                            "UPDATE cart_lines SET quantity = ?2, updated_at = ?3 WHERE id = ?1",
                        )
                        .bind(&user_line.id)
                        .bind(merged)
                        .bind(now)
                        .execute(&self.pool)
                        .await?;
                    }
                }
                None => {
                    sqlx::query(
                        "UPDATE cart_lines SET cart_id = ?2, updated_at = ?3 WHERE id = ?1",
                    )
                    .bind(&guest_line.id)
                    .bind(&user_cart.id)
                    .bind(now)
                    .execute(&self.pool)
                    .await?;
                }
            }
        }

        sqlx::query("DELETE FROM carts WHERE id = ?1")
            .bind(&guest_cart.id)
            .execute(&self.pool)
            .await?;

        self.invalidate_total(&guest_cart.id).await;
        self.invalidate_total(&user_cart.id).await;

        info!(user_cart = %user_cart.id, guest_cart = %guest_cart.id, "Guest cart merged");
        Ok(user_cart)
    }

    // =========================================================================
    // Totals
    // =========================================================================

    /// Sum of line totals (unit price × quantity) for a cart.
    ///
    /// Read-through cached by cart id. The cache is never the system of
    /// record: a miss or eviction only costs a recompute.
    pub async fn calculate_total(&self, cart_id: &str) -> StoreResult<Money> {
        if let Some(cached) = self.totals_cache.get(cart_id).await {
            return Ok(Money::from_cents(cached));
        }

        let cart = self
            .get(cart_id)
            .await?
            .ok_or_else(|| CoreError::CartNotFound(cart_id.to_string()))?;

        let mut total = Money::zero();
        for line in self.lines(&cart.id).await? {
            let pricing = self
                .products()
                .line_pricing(&line.product_id, line.variant_id.as_deref())
                .await?;
            total += Money::from_cents(pricing.unit_price_cents).multiply_quantity(line.quantity);
        }

        self.totals_cache.insert(cart.id, total.cents()).await;
        Ok(total)
    }

    /// Synchronously drops the cached total for a cart.
    pub(crate) async fn invalidate_total(&self, cart_id: &str) {
        self.totals_cache.invalidate(cart_id).await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
