//! Background cancellation of abandoned orders.
//!
//! A PENDING order that has not been paid within the configured TTL is
//! cancelled. Its gateway order is left to expire on Razorpay's side; a
//! payment that still arrives afterwards is rejected by settlement and
//! escalated.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use bazaar_core::OrderId;

use crate::db::{OrderRepository, RepositoryError};

/// Cancel PENDING orders created more than `ttl` ago.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails, or
/// `RepositoryError::DataCorruption` if `ttl` is out of range.
#[instrument(skip(pool))]
pub async fn expire_abandoned(
    pool: &PgPool,
    ttl: Duration,
) -> Result<Vec<OrderId>, RepositoryError> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid order TTL: {e}")))?;
    let cutoff = Utc::now() - ttl;

    let expired = OrderRepository::new(pool).expire_pending(cutoff).await?;
    if !expired.is_empty() {
        info!(count = expired.len(), orders = ?expired, "Expired abandoned orders");
    }
    Ok(expired)
}

/// Spawn the periodic reaper. Runs until the runtime shuts down.
pub fn spawn(pool: PgPool, ttl: Duration, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = expire_abandoned(&pool, ttl).await {
                error!(error = %e, "Failed to expire abandoned orders");
            }
        }
    })
}
