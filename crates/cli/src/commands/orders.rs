//! Order maintenance commands.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `CHECKOUT_PENDING_ORDER_TTL_MINUTES` - default age for `expire`
//! - `RAZORPAY_KEY_ID`, `RAZORPAY_KEY_SECRET` - for `gateway`

use std::time::Duration;

use tracing::{info, warn};

use bazaar_core::{OrderId, OrderStatus};
use bazaar_storefront::config::{CheckoutConfig, RazorpayConfig};
use bazaar_storefront::db::OrderRepository;
use bazaar_storefront::razorpay::RazorpayClient;
use bazaar_storefront::reaper;

use super::connect;

/// Cancel pending orders older than the given age.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the update fails.
pub async fn expire(older_than_minutes: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let ttl = match older_than_minutes {
        Some(minutes) => Duration::from_secs(minutes * 60),
        None => CheckoutConfig::from_env()?.pending_order_ttl,
    };

    let pool = connect().await?;
    let expired = reaper::expire_abandoned(&pool, ttl).await?;

    info!(
        count = expired.len(),
        older_than_minutes = ttl.as_secs() / 60,
        "Expired pending orders"
    );
    Ok(())
}

/// Compare an order with its Razorpay order.
///
/// # Errors
///
/// Returns an error if the order does not exist, Razorpay credentials are
/// missing, or the gateway request fails.
pub async fn gateway(order_id: i32) -> Result<(), Box<dyn std::error::Error>> {
    let order_id = OrderId::new(order_id);
    let pool = connect().await?;

    let order = OrderRepository::new(&pool)
        .get(order_id)
        .await?
        .ok_or_else(|| format!("Order {order_id} not found"))?;

    info!(
        order_id = %order.id,
        status = %order.status,
        total = %order.total,
        currency = %order.currency,
        "Order"
    );

    let Some(razorpay_order_id) = order.razorpay_order_id.as_deref() else {
        info!("No Razorpay order yet; the customer never reached the payment modal");
        return Ok(());
    };

    let client = RazorpayClient::new(&RazorpayConfig::from_env()?)?;
    let remote = client.fetch_order(razorpay_order_id).await?;

    info!(
        razorpay_order_id = %remote.id,
        status = %remote.status,
        amount = remote.amount,
        amount_paid = remote.amount_paid,
        attempts = remote.attempts,
        "Razorpay order"
    );

    let expected = order.total_money()?.to_minor_units()?;
    if remote.amount != expected {
        warn!(expected, gateway = remote.amount, "Gateway amount differs from order total");
    }

    match (order.status, remote.is_paid()) {
        (OrderStatus::Pending, true) => {
            warn!("Gateway reports paid but order is pending; a webhook or callback has not settled it");
        }
        (OrderStatus::Cancelled, true) => {
            warn!("Gateway reports paid for a cancelled order; refund or fulfil manually");
        }
        (OrderStatus::Paid, false) => {
            warn!("Order is paid but the gateway order is not; check the payment in the dashboard");
        }
        _ => info!("Order and gateway agree"),
    }

    Ok(())
}
