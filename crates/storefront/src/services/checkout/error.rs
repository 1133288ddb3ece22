//! Checkout service errors.

use bazaar_core::{MoneyError, OrderStatus, PricingError, ProductId, TransitionError};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::razorpay::{RazorpayError, SignatureError};

/// How an error should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The customer can fix it (pick an address, reduce a quantity).
    UserInput,
    /// Safe to retry the same action.
    Transient,
    /// Money may have moved but local state was not updated; needs a human.
    Integrity,
    /// A bug or infrastructure failure.
    Internal,
}

/// Errors that can occur during checkout and payment.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A checkout step guard failed.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The selected address does not exist or is not the user's.
    #[error("address not found")]
    AddressNotFound,

    /// Some selected items are no longer in the cart.
    #[error("some selected items are no longer in your cart")]
    ItemsUnavailable,

    /// Not enough stock to place the order.
    #[error("only {available} left of {title}")]
    OutOfStock { title: String, available: i32 },

    /// Line items could not be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// The order does not exist or is not the user's.
    #[error("order not found")]
    OrderNotFound,

    /// The order can no longer be paid.
    #[error("order is {0}")]
    OrderNotPayable(OrderStatus),

    /// The payment gateway could not be reached or rejected the request.
    #[error("payment gateway error: {0}")]
    Gateway(#[from] RazorpayError),

    /// The payment callback signature did not verify.
    #[error("payment signature invalid: {0}")]
    Signature(#[from] SignatureError),

    /// The callback names a different gateway order than the one stored.
    #[error("gateway order {received} does not match order {order_id}")]
    GatewayOrderMismatch { order_id: String, received: String },

    /// The gateway reports a different amount than the order total.
    #[error("paid amount {paid} does not match order amount {expected}")]
    AmountMismatch { expected: i64, paid: i64 },

    /// The stored total disagrees with the order's locked items.
    #[error("stored total {stored} does not match locked items {computed}")]
    TotalMismatch { stored: Decimal, computed: Decimal },

    /// A verified payment arrived for a cancelled order.
    #[error("payment received for cancelled order")]
    PaidAfterCancel,

    /// A verified payment arrived but stock ran out.
    #[error("insufficient stock for product {0} after payment")]
    StockExhausted(ProductId),

    /// Webhook secret is not configured.
    #[error("webhooks are not configured")]
    WebhookDisabled,

    /// Webhook body could not be parsed.
    #[error("invalid webhook payload: {0}")]
    WebhookPayload(String),

    /// Amount conversion failed.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Database operation failed.
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CheckoutError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InsufficientStock(product) => Self::StockExhausted(product),
            RepositoryError::InvalidStatus(OrderStatus::Cancelled) => Self::PaidAfterCancel,
            RepositoryError::InvalidStatus(status) => Self::OrderNotPayable(status),
            other => Self::Repository(other),
        }
    }
}

impl CheckoutError {
    /// Classify this error for responses and alerting.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transition(_)
            | Self::AddressNotFound
            | Self::ItemsUnavailable
            | Self::OutOfStock { .. }
            | Self::OrderNotPayable(_)
            | Self::WebhookPayload(_) => ErrorKind::UserInput,
            Self::Gateway(_) | Self::OrderNotFound => ErrorKind::Transient,
            Self::Signature(_)
            | Self::GatewayOrderMismatch { .. }
            | Self::AmountMismatch { .. }
            | Self::TotalMismatch { .. }
            | Self::PaidAfterCancel
            | Self::StockExhausted(_) => ErrorKind::Integrity,
            Self::Pricing(_) | Self::WebhookDisabled | Self::Money(_) | Self::Repository(_) => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_map_to_settlement_failures() {
        assert!(matches!(
            CheckoutError::from(RepositoryError::InsufficientStock(ProductId::new(3))),
            CheckoutError::StockExhausted(p) if p == ProductId::new(3)
        ));
        assert!(matches!(
            CheckoutError::from(RepositoryError::InvalidStatus(OrderStatus::Cancelled)),
            CheckoutError::PaidAfterCancel
        ));
        assert!(matches!(
            CheckoutError::from(RepositoryError::NotFound),
            CheckoutError::Repository(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CheckoutError::Transition(TransitionError::NoItemsSelected).kind(),
            ErrorKind::UserInput
        );
        assert_eq!(CheckoutError::OrderNotFound.kind(), ErrorKind::Transient);
        assert_eq!(
            CheckoutError::Signature(SignatureError::Mismatch).kind(),
            ErrorKind::Integrity
        );
        assert_eq!(CheckoutError::PaidAfterCancel.kind(), ErrorKind::Integrity);
        assert_eq!(
            CheckoutError::Repository(RepositoryError::NotFound).kind(),
            ErrorKind::Internal
        );
    }
}
