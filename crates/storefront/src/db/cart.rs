//! Cart repository.

use sqlx::PgPool;

use bazaar_core::{CartItemId, ProductId, UserId};

use super::{RepositoryError, map_constraint_error};
use crate::models::{CartLine, MAX_LINE_QUANTITY};

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's cart with live product prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, CartLine>(
            r"
            SELECT c.id, c.product_id, p.title, c.quantity,
                   p.price AS unit_price, p.discount_percentage, p.stock
            FROM storefront.cart_items c
            JOIN storefront.products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.created_at, c.id
            ",
        )
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        Ok(lines)
    }

    /// Add a product, incrementing the quantity if it is already in the cart.
    ///
    /// The incremented quantity is capped at [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartItemId, RepositoryError> {
        let id = sqlx::query_scalar::<_, CartItemId>(
            r"
            INSERT INTO storefront.cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = LEAST(storefront.cart_items.quantity + EXCLUDED.quantity, $4),
                          updated_at = now()
            RETURNING id
            ",
        )
        .bind(user)
        .bind(product)
        .bind(quantity)
        .bind(MAX_LINE_QUANTITY)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_constraint_error(e, "product already in cart"))?;

        Ok(id)
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this user's cart.
    pub async fn set_quantity(
        &self,
        user: UserId,
        item: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        if quantity == 0 {
            return self.remove(user, item).await;
        }

        let result = sqlx::query(
            r"
            UPDATE storefront.cart_items
            SET quantity = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(item)
        .bind(user)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in this user's cart.
    pub async fn remove(&self, user: UserId, item: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_items
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(item)
        .bind(user)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// The selected lines of a user's cart, with a live price and stock snapshot.
    ///
    /// Lines not in this user's cart are silently skipped; callers compare
    /// the result against their selection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_for_checkout(
        &self,
        user: UserId,
        items: &[CartItemId],
    ) -> Result<Vec<CartLine>, RepositoryError> {
        let ids: Vec<i32> = items.iter().map(CartItemId::as_i32).collect();

        let lines = sqlx::query_as::<_, CartLine>(
            r"
            SELECT c.id, c.product_id, p.title, c.quantity,
                   p.price AS unit_price, p.discount_percentage, p.stock
            FROM storefront.cart_items c
            JOIN storefront.products p ON p.id = c.product_id
            WHERE c.user_id = $1 AND c.id = ANY($2)
            ORDER BY c.id
            ",
        )
        .bind(user)
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(lines)
    }
}
