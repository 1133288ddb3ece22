//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses are JSON: `{ "success": false, "error": "<message>" }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use bazaar_core::TransitionError;

use crate::db::RepositoryError;
use crate::services::checkout::{CheckoutError, ErrorKind};

/// Shown when a payment may have gone through but could not be recorded.
pub const PAYMENT_VERIFICATION_FAILED: &str = "Payment verification failed, contact support";

/// Shown when the payment modal cannot be prepared.
pub const PAYMENT_DETAILS_FAILED: &str = "Failed to load payment details";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Checkout or payment operation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        Self::Checkout(CheckoutError::Transition(err))
    }
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            Self::Database(RepositoryError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            Self::Checkout(err) => checkout_status_and_message(err),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
        }
    }

    /// Whether this error should be reported to Sentry.
    fn is_reportable(&self) -> bool {
        match self {
            Self::Database(RepositoryError::NotFound | RepositoryError::Conflict(_)) => false,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => true,
            Self::Checkout(err) => matches!(
                err.kind(),
                ErrorKind::Integrity | ErrorKind::Internal
            ) || matches!(err, CheckoutError::Gateway(_)),
            _ => false,
        }
    }
}

fn checkout_status_and_message(err: &CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::Transition(_)
        | CheckoutError::ItemsUnavailable
        | CheckoutError::WebhookPayload(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::AddressNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::OutOfStock { .. } | CheckoutError::OrderNotPayable(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::OrderNotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
        CheckoutError::Gateway(_) => (StatusCode::BAD_GATEWAY, PAYMENT_DETAILS_FAILED.to_string()),
        CheckoutError::Signature(_) | CheckoutError::GatewayOrderMismatch { .. } => (
            StatusCode::BAD_REQUEST,
            PAYMENT_VERIFICATION_FAILED.to_string(),
        ),
        CheckoutError::AmountMismatch { .. }
        | CheckoutError::PaidAfterCancel
        | CheckoutError::StockExhausted(_) => (
            StatusCode::CONFLICT,
            PAYMENT_VERIFICATION_FAILED.to_string(),
        ),
        CheckoutError::TotalMismatch { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            PAYMENT_DETAILS_FAILED.to_string(),
        ),
        CheckoutError::WebhookDisabled => (StatusCode::NOT_FOUND, "Not found".to_string()),
        CheckoutError::Pricing(_) | CheckoutError::Money(_) | CheckoutError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors and payment integrity failures to Sentry
        if self.is_reportable() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        // Don't expose internal error details to clients
        let (status, message) = self.status_and_message();

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this once the request's user is known to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use bazaar_core::{OrderStatus, ProductId};
    use http_body_util::BodyExt;

    use super::*;
    use crate::razorpay::SignatureError;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn get_body(err: AppError) -> serde_json::Value {
        let bytes = err
            .into_response()
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order-123".to_string());
        assert_eq!(err.to_string(), "Not found: order-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_error_status_codes() {
        assert_eq!(
            get_status(TransitionError::NoAddressSelected.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::OrderNotPayable(OrderStatus::Paid).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::Signature(SignatureError::Mismatch).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::StockExhausted(ProductId::new(1)).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::OrderNotFound.into()),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_integrity_errors_ask_customer_to_contact_support() {
        let body = get_body(CheckoutError::Signature(SignatureError::Mismatch).into()).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], PAYMENT_VERIFICATION_FAILED);

        let body = get_body(CheckoutError::PaidAfterCancel.into()).await;
        assert_eq!(body["error"], PAYMENT_VERIFICATION_FAILED);
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = get_body(AppError::Internal("connection refused".to_string())).await;
        assert_eq!(body["error"], "Internal server error");
    }
}
