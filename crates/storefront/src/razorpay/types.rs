//! Razorpay request, response and webhook payload types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: String,
    /// Merchant reference, at most 40 characters.
    pub receipt: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, String>,
}

/// A gateway order as returned by `POST /orders` and `GET /orders/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    /// `created`, `attempted` or `paid`.
    pub status: String,
    #[serde(default)]
    pub attempts: u32,
}

impl RazorpayOrder {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == "paid"
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

// =============================================================================
// Webhooks
// =============================================================================

/// A webhook delivery. Only the fields used for settlement are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// e.g. `payment.captured`, `order.paid`, `payment.failed`
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<EntityWrapper<PaymentEntity>>,
    pub order: Option<EntityWrapper<OrderEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderEntity {
    pub id: String,
    pub amount: i64,
    pub status: String,
}

impl WebhookEvent {
    /// The `(razorpay_order_id, razorpay_payment_id)` pair for events that
    /// confirm a payment, or `None` for events that settle nothing.
    #[must_use]
    pub fn captured_payment(&self) -> Option<(&str, &str)> {
        if !matches!(self.event.as_str(), "payment.captured" | "order.paid") {
            return None;
        }

        let payment = &self.payload.payment.as_ref()?.entity;
        let order_id = payment
            .order_id
            .as_deref()
            .or_else(|| self.payload.order.as_ref().map(|o| o.entity.id.as_str()))?;

        Some((order_id, payment.id.as_str()))
    }
}

// =============================================================================
// Browser checkout
// =============================================================================

/// Options object handed to `new Razorpay(options)` in the browser.
///
/// `handler` and `modal.ondismiss` are attached by `static/js/checkout.js`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOptions {
    pub key: String,
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub order_id: String,
    pub prefill: Prefill,
    pub notes: BTreeMap<String, String>,
    pub theme: Theme,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Prefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Theme {
    pub color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            color: "#1f6feb".to_string(),
        }
    }
}
