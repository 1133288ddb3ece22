//! User lookups.
//!
//! Users are owned by the login service. Checkout only needs contact details
//! to prefill the payment modal.

use sqlx::PgPool;

use bazaar_core::{Email, UserId};

use super::RepositoryError;

/// Contact details for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContact {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: Option<String>,
}

impl TryFrom<UserRow> for UserContact {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(Self {
            id: row.id,
            email,
            name: row.name,
        })
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's contact details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_contact(&self, id: UserId) -> Result<Option<UserContact>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name
            FROM storefront.users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(UserContact::try_from).transpose()
    }

    /// Create a user, or return the existing one with this email.
    ///
    /// Used by seeding and tests; production users come from the login service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ensure(
        &self,
        email: &Email,
        name: Option<&str>,
    ) -> Result<UserContact, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO storefront.users (email, name)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE SET name = COALESCE(EXCLUDED.name, storefront.users.name)
            RETURNING id, email, name
            ",
        )
        .bind(email.as_str())
        .bind(name)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }
}
