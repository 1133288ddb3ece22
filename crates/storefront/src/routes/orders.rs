//! Order confirmation page.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use rust_decimal::Decimal;
use tracing::instrument;

use bazaar_core::pricing::line_total;
use bazaar_core::{Money, OrderId, OrderStatus};

use crate::db::{AddressRepository, OrderRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Address;
use crate::state::AppState;

/// One purchased line as shown on the confirmation page.
pub struct ConfirmationLine {
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
    pub line_total: String,
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/confirmation.html")]
pub struct ConfirmationTemplate {
    pub store_name: String,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub paid: bool,
    pub total_display: String,
    pub lines: Vec<ConfirmationLine>,
    pub address: Option<Address>,
}

/// Show an order's confirmation page to its owner.
///
/// Until the payment is recorded the page says the payment is processing;
/// a webhook may still settle it.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn confirmation(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<ConfirmationTemplate> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get_for_user(id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let items = orders.items(order.id).await?;

    let total = order
        .total_money()
        .map_err(|e| AppError::Database(RepositoryError::DataCorruption(e)))?;
    let currency = total.currency();

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let price = item
            .price()
            .map_err(|e| AppError::Database(RepositoryError::DataCorruption(e.to_string())))?;
        let exact = line_total(&price)
            .map_err(|e| AppError::Database(RepositoryError::DataCorruption(e.to_string())))?;
        lines.push(ConfirmationLine {
            title: item.title,
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount_percentage: item.discount_percentage,
            line_total: Money::new(exact, currency).display(),
        });
    }

    let address = AddressRepository::new(state.pool())
        .get(user.id, order.address_id)
        .await?;

    Ok(ConfirmationTemplate {
        store_name: state.config().store_name.clone(),
        order_id: order.id,
        status: order.status,
        paid: order.status == OrderStatus::Paid,
        total_display: total.display(),
        lines,
        address,
    })
}
