//! Address repository.
//!
//! The "at most one default per user" rule is enforced here, inside a
//! transaction, and backed by the `addresses_one_default_per_user` partial
//! unique index.

use sqlx::{PgPool, Postgres, Transaction};

use bazaar_core::{AddressId, UserId};

use super::{RepositoryError, map_constraint_error};
use crate::models::{Address, AddressInput};

const ADDRESS_COLUMNS: &str =
    "id, user_id, name, line1, line2, city, state, postal_code, country, phone, is_default";

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.addresses
             WHERE user_id = $1
             ORDER BY is_default DESC, created_at, id"
        );
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(user)
            .fetch_all(self.pool)
            .await?;

        Ok(addresses)
    }

    /// Get one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.addresses WHERE id = $1 AND user_id = $2"
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .bind(user)
            .fetch_optional(self.pool)
            .await?;

        Ok(address)
    }

    /// Create an address. A user's first address always becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a concurrent request claimed the
    /// default at the same time.
    pub async fn create(
        &self,
        user: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user).await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM storefront.addresses WHERE user_id = $1")
                .bind(user)
                .fetch_one(&mut *tx)
                .await?;

        let is_default = input.is_default || existing == 0;
        if is_default {
            clear_default(&mut tx, user).await?;
        }

        let sql = format!(
            "INSERT INTO storefront.addresses
                 (user_id, name, line1, line2, city, state, postal_code, country, phone, is_default)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {ADDRESS_COLUMNS}"
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(user)
            .bind(&input.name)
            .bind(&input.line1)
            .bind(input.line2.as_deref())
            .bind(&input.city)
            .bind(&input.state)
            .bind(&input.postal_code)
            .bind(&input.country)
            .bind(&input.phone)
            .bind(is_default)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_constraint_error(e, "default address changed concurrently"))?;

        tx.commit().await?;
        Ok(address)
    }

    /// Make an address the user's only default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn set_default(&self, user: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user).await?;

        clear_default(&mut tx, user).await?;

        let result = sqlx::query(
            r"
            UPDATE storefront.addresses
            SET is_default = TRUE, updated_at = now()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint_error(e, "default address changed concurrently"))?;

        if result.rows_affected() == 0 {
            // Dropping the transaction restores the previous default
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete an address. If it was the default, the oldest remaining
    /// address is promoted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn delete(&self, user: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user).await?;

        let was_default: Option<bool> = sqlx::query_scalar(
            r"
            DELETE FROM storefront.addresses
            WHERE id = $1 AND user_id = $2
            RETURNING is_default
            ",
        )
        .bind(id)
        .bind(user)
        .fetch_optional(&mut *tx)
        .await?;

        match was_default {
            None => return Err(RepositoryError::NotFound),
            Some(true) => {
                sqlx::query(
                    r"
                    UPDATE storefront.addresses
                    SET is_default = TRUE, updated_at = now()
                    WHERE id = (
                        SELECT id FROM storefront.addresses
                        WHERE user_id = $1
                        ORDER BY created_at, id
                        LIMIT 1
                    )
                    ",
                )
                .bind(user)
                .execute(&mut *tx)
                .await?;
            }
            Some(false) => {}
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Serialize default-address changes for one user.
async fn lock_user(tx: &mut Transaction<'_, Postgres>, user: UserId) -> Result<(), RepositoryError> {
    sqlx::query("SELECT id FROM storefront.users WHERE id = $1 FOR UPDATE")
        .bind(user)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    Ok(())
}

async fn clear_default(
    tx: &mut Transaction<'_, Postgres>,
    user: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE storefront.addresses
        SET is_default = FALSE, updated_at = now()
        WHERE user_id = $1 AND is_default
        ",
    )
    .bind(user)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
