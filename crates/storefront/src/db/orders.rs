//! Order repository.
//!
//! Orders are created PENDING with prices copied from the catalog, then either
//! settled by a verified payment or cancelled. Settlement runs in a single
//! transaction holding the order row lock:
//!
//! ```text
//! SELECT ... FOR UPDATE             -- serialize callbacks for this order
//! OrderStatus::settle()             -- Apply | AlreadyPaid | Rejected
//! UPDATE products SET stock = stock - qty WHERE stock >= qty   (per item)
//! UPDATE orders SET status = 'paid', paid_at = now()
//! DELETE purchased cart lines
//! COMMIT
//! ```

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use bazaar_core::{OrderId, OrderStatus, ProductId, UserId};
use bazaar_core::types::Settlement;

use super::{RepositoryError, map_constraint_error};
use crate::models::{NewOrder, Order, OrderItem, PaymentOutcome};

const ORDER_COLUMNS: &str = "id, user_id, address_id, idempotency_key, status, total, currency, \
     razorpay_order_id, razorpay_payment_id, created_at, paid_at, abandoned_at, cancelled_at";

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a PENDING order and its items.
    ///
    /// Idempotent on `idempotency_key`: a retry with the same key returns the
    /// order created by the first attempt instead of inserting another.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the key belongs to another user.
    /// Returns `RepositoryError::DataCorruption` if the items cannot be priced.
    pub async fn create_pending(&self, new_order: &NewOrder) -> Result<Order, RepositoryError> {
        let total = new_order
            .total()
            .map_err(|e| RepositoryError::DataCorruption(format!("unpriceable order: {e}")))?;

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO storefront.orders (user_id, address_id, idempotency_key, total, currency)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (idempotency_key) DO NOTHING
             RETURNING {ORDER_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Order>(&sql)
            .bind(new_order.user_id)
            .bind(new_order.address_id)
            .bind(new_order.idempotency_key)
            .bind(total.amount())
            .bind(total.currency().code())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(order) = inserted else {
            let existing = fetch_by_idempotency_key(&mut tx, new_order.idempotency_key)
                .await?
                .ok_or(RepositoryError::NotFound)?;
            if existing.user_id != new_order.user_id {
                return Err(RepositoryError::Conflict(
                    "idempotency key already used".to_owned(),
                ));
            }
            tx.commit().await?;
            return Ok(existing);
        };

        for item in &new_order.items {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!("quantity {} too large", item.quantity))
            })?;

            sqlx::query(
                r"
                INSERT INTO storefront.order_items
                    (order_id, product_id, title, quantity, unit_price, discount_percentage)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.title)
            .bind(quantity)
            .bind(item.unit_price)
            .bind(item.discount_percentage)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint_error(e, "product appears twice in order"))?;
        }

        tx.commit().await?;
        Ok(order)
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(order)
    }

    /// Get an order only if it belongs to `user`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1 AND user_id = $2"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(user)
            .fetch_optional(self.pool)
            .await?;

        Ok(order)
    }

    /// Find the order correlated with a Razorpay order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE razorpay_order_id = $1"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(razorpay_order_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(order)
    }

    /// Locked line items of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT order_id, product_id, title, quantity, unit_price, discount_percentage
            FROM storefront.order_items
            WHERE order_id = $1
            ORDER BY product_id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// Store the Razorpay order id for a PENDING order.
    ///
    /// Compare-and-set: if another request already attached one, that id is
    /// returned and `razorpay_order_id` is discarded. Callers must use the
    /// returned value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::InvalidStatus` if it is no longer PENDING.
    pub async fn attach_gateway_order(
        &self,
        id: OrderId,
        razorpay_order_id: &str,
    ) -> Result<String, RepositoryError> {
        let attached: Option<String> = sqlx::query_scalar(
            r"
            UPDATE storefront.orders
            SET razorpay_order_id = $2
            WHERE id = $1 AND razorpay_order_id IS NULL AND status = 'pending'
            RETURNING razorpay_order_id
            ",
        )
        .bind(id)
        .bind(razorpay_order_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_constraint_error(e, "gateway order already attached elsewhere"))?;

        if let Some(stored) = attached {
            return Ok(stored);
        }

        let order = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        match order.razorpay_order_id {
            Some(stored) if order.status == OrderStatus::Pending => Ok(stored),
            _ => Err(RepositoryError::InvalidStatus(order.status)),
        }
    }

    /// Settle a verified payment.
    ///
    /// Safe to call any number of times for the same order: only the first
    /// call for a PENDING order decrements stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown order,
    /// `RepositoryError::InvalidStatus(Cancelled)` if the order was cancelled,
    /// and `RepositoryError::InsufficientStock` if any item cannot be
    /// fulfilled. Nothing is written in any error case.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        razorpay_payment_id: &str,
    ) -> Result<PaymentOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1 FOR UPDATE");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        match order.status.settle() {
            Settlement::AlreadyPaid => return Ok(PaymentOutcome::AlreadyPaid),
            Settlement::Rejected => return Err(RepositoryError::InvalidStatus(order.status)),
            Settlement::Apply => {}
        }

        // Product order keeps lock acquisition consistent across concurrent settlements
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT order_id, product_id, title, quantity, unit_price, discount_percentage
            FROM storefront.order_items
            WHERE order_id = $1
            ORDER BY product_id
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let mut purchased: Vec<ProductId> = Vec::with_capacity(items.len());
        for item in &items {
            decrement_stock(&mut tx, item.product_id, item.quantity).await?;
            purchased.push(item.product_id);
        }

        sqlx::query(
            r"
            UPDATE storefront.orders
            SET status = 'paid', paid_at = now(), razorpay_payment_id = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(razorpay_payment_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            DELETE FROM storefront.cart_items
            WHERE user_id = $1 AND product_id = ANY($2)
            ",
        )
        .bind(order.user_id)
        .bind(purchased.iter().map(ProductId::as_i32).collect::<Vec<_>>())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(PaymentOutcome::Completed)
    }

    /// Record that the customer dismissed the payment modal.
    ///
    /// The order stays PENDING so "Pay Now" can resume it. Returns the order
    /// as it is after the call; dismissing a paid or cancelled order changes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order is not the user's.
    pub async fn mark_abandoned(&self, id: OrderId, user: UserId) -> Result<Order, RepositoryError> {
        let sql = format!(
            "UPDATE storefront.orders
             SET abandoned_at = now()
             WHERE id = $1 AND user_id = $2 AND status = 'pending'
             RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(user)
            .fetch_optional(self.pool)
            .await?;

        match updated {
            Some(order) => Ok(order),
            None => self
                .get_for_user(id, user)
                .await?
                .ok_or(RepositoryError::NotFound),
        }
    }

    /// Cancel a PENDING order. Returns whether this call cancelled it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cancel(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.orders
            SET status = 'cancelled', cancelled_at = now()
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancel every PENDING order created before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn expire_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<OrderId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, OrderId>(
            r"
            UPDATE storefront.orders
            SET status = 'cancelled', cancelled_at = now()
            WHERE status = 'pending' AND created_at < $1
            RETURNING id
            ",
        )
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        Ok(ids)
    }
}

async fn fetch_by_idempotency_key(
    tx: &mut Transaction<'_, Postgres>,
    key: Uuid,
) -> Result<Option<Order>, RepositoryError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE idempotency_key = $1");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(order)
}

/// Decrement stock only if enough is left.
async fn decrement_stock(
    tx: &mut Transaction<'_, Postgres>,
    product: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.products
        SET stock = stock - $2, updated_at = now()
        WHERE id = $1 AND stock >= $2
        ",
    )
    .bind(product)
    .bind(quantity)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::InsufficientStock(product));
    }
    Ok(())
}
