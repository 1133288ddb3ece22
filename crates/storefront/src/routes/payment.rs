//! Payment callback handlers.
//!
//! `success` is called by `checkout.js` from the Razorpay modal's `handler`,
//! `cancel` from `modal.ondismiss`, and `webhook` by Razorpay itself.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::OrderId;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::PaymentOutcome;
use crate::routes::checkout::{load_flow, save_flow};
use crate::services::checkout::{CheckoutService, PaymentConfirmation, WebhookOutcome};
use crate::state::AppState;

/// Header carrying the webhook body's HMAC.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Body for `POST /api/payment/cancel`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPayment {
    pub order_id: OrderId,
}

fn confirmation_path(order_id: OrderId) -> String {
    format!("/orders/{order_id}/confirmation")
}

/// Verify the modal's signed result and mark the order paid.
///
/// No login is required: the signature binds the Razorpay order to our
/// order. When the request carries a session whose flow paid this order,
/// the flow is reset so the next checkout starts fresh.
#[instrument(skip_all, fields(order_id = %confirmation.order_id))]
pub async fn success(
    State(state): State<AppState>,
    session: Option<Extension<Session>>,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Result<Json<Value>> {
    let outcome = CheckoutService::from_state(&state)
        .confirm_payment(&confirmation)
        .await?;

    let order_id = confirmation.order_id.to_string();
    add_breadcrumb(
        "payment",
        "Payment verified",
        Some(&[
            ("order_id", order_id.as_str()),
            ("outcome", outcome_label(outcome)),
        ]),
    );

    if let Some(Extension(session)) = session {
        let mut flow = load_flow(&session).await?;
        if flow.order_id() == Some(confirmation.order_id) {
            flow.reset();
            save_flow(&session, &flow).await?;
        }
    }

    Ok(Json(json!({
        "success": true,
        "redirect": confirmation_path(confirmation.order_id),
    })))
}

const fn outcome_label(outcome: PaymentOutcome) -> &'static str {
    match outcome {
        PaymentOutcome::Completed => "completed",
        PaymentOutcome::AlreadyPaid => "already_paid",
    }
}

/// Record that the customer closed the modal without paying.
///
/// The order stays pending so "Pay Now" can reopen the same payment.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<CancelPayment>,
) -> Result<Json<Value>> {
    let order = CheckoutService::from_state(&state)
        .cancel_payment(user.id, body.order_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "orderId": order.id,
        "status": order.status,
    })))
}

/// Razorpay webhook receiver.
///
/// The raw body is needed for the signature, so it is taken as bytes and
/// parsed by the service after verification.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = CheckoutService::from_state(&state)
        .handle_webhook(&body, signature)
        .await?;

    let status = match outcome {
        WebhookOutcome::Settled(outcome) => outcome_label(outcome),
        WebhookOutcome::Ignored => "ignored",
    };
    tracing::info!(status, "Webhook processed");

    Ok(Json(json!({ "success": true, "status": status })))
}
