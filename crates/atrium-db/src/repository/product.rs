//! # Catalog Repository
//!
//! Read access to products and variants, plus the writes the excluded
//! admin layer needs for seeding.
//!
//! ## Role In The Engine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The transaction engine never edits the catalog; it reads it at two    │
//! │  moments only:                                                          │
//! │                                                                         │
//! │  1. Cart mutation   - is the product active / variant available?       │
//! │                       what is the unit price right now?                 │
//! │  2. Order creation  - re-validate availability, then FREEZE name and   │
//! │                       price into the order line snapshot                │
//! │                                                                         │
//! │  After creation, order history never touches these tables again.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult, StoreError, StoreResult};
use atrium_core::{CoreError, Product, ProductVariant, SkuRef};

/// Repository for catalog reads.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

/// Everything the cart and order flows need to know about one line's SKU:
/// price at this moment, display names for snapshots, and sellability.
#[derive(Debug, Clone)]
pub struct LinePricing {
    /// Stock counter the line draws from.
    pub sku_ref: SkuRef,
    /// Business code for error messages (product SKU, plus variant name).
    pub sku_code: String,
    /// Product name at this moment (snapshot source).
    pub product_name: String,
    /// Variant name at this moment (snapshot source).
    pub variant_name: Option<String>,
    /// product price + variant adjustment, in cents.
    pub unit_price_cents: i64,
    /// Product active and, if a variant is involved, variant available.
    pub sellable: bool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, description, price_cents, is_active,
                   created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a variant by its ID.
    pub async fn get_variant(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT id, product_id, name, price_adjustment_cents, is_available,
                   created_at, updated_at
            FROM product_variants
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Resolves pricing, snapshot names and sellability for one
    /// (product, variant?) pair.
    ///
    /// ## Errors
    /// - `ProductNotFound` / `VariantNotFound` when the ids are stale
    /// - `VariantNotFound` when the variant belongs to another product
    pub async fn line_pricing(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> StoreResult<LinePricing> {
        let product = self
            .get_product(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        match variant_id {
            None => Ok(LinePricing {
                sku_ref: SkuRef::Product(product.id.clone()),
                sku_code: product.sku.clone(),
                product_name: product.name,
                variant_name: None,
                unit_price_cents: product.price_cents,
                sellable: product.is_active,
            }),
            Some(variant_id) => {
                let variant = self
                    .get_variant(variant_id)
                    .await?
                    .filter(|v| v.product_id == product.id)
                    .ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()))?;

                Ok(LinePricing {
                    sku_ref: SkuRef::Variant(variant.id.clone()),
                    sku_code: format!("{} ({})", product.sku, variant.name),
                    product_name: product.name,
                    variant_name: Some(variant.name),
                    unit_price_cents: product.price_cents + variant.price_adjustment_cents,
                    sellable: product.is_active && variant.is_available,
                })
            }
        }
    }

    /// Returns an `Unavailable` error unless the pricing row is sellable.
    pub fn ensure_sellable(pricing: &LinePricing) -> Result<(), StoreError> {
        if pricing.sellable {
            Ok(())
        } else {
            Err(CoreError::Unavailable {
                sku: pricing.sku_code.clone(),
            }
            .into())
        }
    }

    /// Inserts a new product (admin/seed path).
    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, price_cents, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a new variant (admin/seed path).
    pub async fn insert_variant(&self, variant: &ProductVariant) -> DbResult<()> {
        debug!(product_id = %variant.product_id, name = %variant.name, "Inserting variant");

        sqlx::query(
            r#"
            INSERT INTO product_variants (
                id, product_id, name, price_adjustment_cents, is_available,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.name)
        .bind(variant.price_adjustment_cents)
        .bind(variant.is_available)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Activates or deactivates a product (soft delete).
    pub async fn set_product_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Marks a variant available or unavailable.
    pub async fn set_variant_available(&self, id: &str, available: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE product_variants SET is_available = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(available)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", id));
        }

        Ok(())
    }
}

/// Helper to generate a new catalog entity ID.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
