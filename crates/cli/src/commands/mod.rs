//! CLI command implementations.

pub mod migrate;
pub mod orders;
pub mod seed;

use sqlx::PgPool;

use bazaar_storefront::{config, db};

/// Connect to the storefront database from `STOREFRONT_DATABASE_URL` / `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    let database_url = config::database_url_from_env()?;
    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}
