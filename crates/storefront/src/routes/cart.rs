//! Cart API handlers.
//!
//! Every response carries the priced summary so the page can redraw totals
//! without a second request.

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use bazaar_core::{CartItemId, ProductId, UserId};

use crate::db::CartRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::MAX_LINE_QUANTITY;
use crate::services::checkout::price_lines;
use crate::state::AppState;

const fn default_quantity() -> i32 {
    1
}

/// Body for `POST /api/cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

/// Body for `PUT /api/cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartLine {
    pub item_id: CartItemId,
    pub quantity: i32,
}

/// Body for `DELETE /api/cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCartLine {
    pub item_id: CartItemId,
}

fn check_quantity(quantity: i32, min: i32) -> Result<()> {
    if (min..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Quantity must be between {min} and {MAX_LINE_QUANTITY}"
        )))
    }
}

async fn cart_json(state: &AppState, user: UserId) -> Result<Value> {
    let lines = CartRepository::new(state.pool()).list(user).await?;
    let summary = price_lines(&lines, state.config().checkout.currency)?;
    Ok(json!({ "success": true, "cart": summary }))
}

/// List the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    Ok(Json(cart_json(&state, user.id).await?))
}

/// Add a product to the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<AddToCart>,
) -> Result<Json<Value>> {
    check_quantity(body.quantity, 1)?;

    CartRepository::new(state.pool())
        .add(user.id, body.product_id, body.quantity)
        .await?;
    tracing::info!(product_id = %body.product_id, quantity = body.quantity, "Added to cart");

    Ok(Json(cart_json(&state, user.id).await?))
}

/// Change a line's quantity; zero removes it.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<UpdateCartLine>,
) -> Result<Json<Value>> {
    check_quantity(body.quantity, 0)?;

    CartRepository::new(state.pool())
        .set_quantity(user.id, body.item_id, body.quantity)
        .await?;

    Ok(Json(cart_json(&state, user.id).await?))
}

/// Remove a line.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<RemoveCartLine>,
) -> Result<Json<Value>> {
    CartRepository::new(state.pool())
        .remove(user.id, body.item_id)
        .await?;

    Ok(Json(cart_json(&state, user.id).await?))
}
