//! Razorpay payment gateway integration.
//!
//! # Flow
//!
//! 1. The server creates a gateway order for a local PENDING order
//!    ([`RazorpayClient::create_order`]) and stores its id on the order.
//! 2. The browser opens the hosted modal with [`CheckoutOptions`].
//! 3. On success the modal hands back `razorpay_payment_id`,
//!    `razorpay_order_id` and `razorpay_signature`, which the server checks
//!    with [`verify_payment_signature`] before marking the order paid.
//!
//! Webhooks (`payment.captured`, `order.paid`) are a second delivery path for
//! the same confirmation and are checked with [`verify_webhook_signature`].
//!
//! # API Reference
//!
//! - Base URL: `https://api.razorpay.com/v1`
//! - Authentication: HTTP basic auth with key id and key secret
//! - Amounts are integers in the currency's minor unit (paise for INR)

mod client;
pub mod signature;
pub mod types;

pub use client::RazorpayClient;
pub use signature::{
    SignatureError, payment_signature, verify_payment_signature, verify_webhook_signature,
    webhook_signature,
};
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to the Razorpay API.
#[derive(Debug, Error)]
pub enum RazorpayError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} {code} - {description}")]
    Api {
        status: u16,
        code: String,
        description: String,
    },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The configured API base cannot carry a path.
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}
