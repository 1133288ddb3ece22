//! Product repository.

use sqlx::PgPool;

use bazaar_core::ProductId;

use super::RepositoryError;
use crate::models::{Product, ProductSeed};

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            SELECT id, sku, title, price, discount_percentage, stock
            FROM storefront.products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Insert or update a product by SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails (including
    /// check-constraint violations for negative prices or stock).
    pub async fn upsert_seed(&self, seed: &ProductSeed) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            INSERT INTO storefront.products (sku, title, price, discount_percentage, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (sku) DO UPDATE
            SET title = EXCLUDED.title,
                price = EXCLUDED.price,
                discount_percentage = EXCLUDED.discount_percentage,
                stock = EXCLUDED.stock,
                updated_at = now()
            RETURNING id, sku, title, price, discount_percentage, stock
            ",
        )
        .bind(&seed.sku)
        .bind(&seed.title)
        .bind(seed.price)
        .bind(seed.discount_percentage)
        .bind(seed.stock)
        .fetch_one(self.pool)
        .await?;

        Ok(product)
    }
}
