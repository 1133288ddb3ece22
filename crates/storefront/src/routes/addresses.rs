//! Address API handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::instrument;

use bazaar_core::AddressId;

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::AddressInput;
use crate::state::AppState;

/// List the user's addresses, default first.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(json!({ "success": true, "addresses": addresses })))
}

/// Create an address. The first one becomes the default.
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Value>)> {
    let input = input
        .normalize()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    tracing::info!(address_id = %address.id, is_default = address.is_default, "Address created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "address": address })),
    ))
}

/// Make an address the default.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn set_default(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<Json<Value>> {
    let repo = AddressRepository::new(state.pool());
    repo.set_default(user.id, id).await?;

    let addresses = repo.list(user.id).await?;
    Ok(Json(json!({ "success": true, "addresses": addresses })))
}

/// Delete an address. If it was the default, the oldest remaining one takes over.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<Json<Value>> {
    let repo = AddressRepository::new(state.pool());
    repo.delete(user.id, id).await?;

    let addresses = repo.list(user.id).await?;
    Ok(Json(json!({ "success": true, "addresses": addresses })))
}
