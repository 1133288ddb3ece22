//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Readiness check (database)
//!
//! # Cart (JSON, requires login)
//! GET    /api/cart                      - Cart lines with a priced summary
//! POST   /api/cart                      - Add a product
//! PUT    /api/cart                      - Set a line's quantity (0 removes)
//! DELETE /api/cart                      - Remove a line
//!
//! # Addresses (JSON, requires login)
//! GET    /api/addresses                 - List addresses
//! POST   /api/addresses                 - Create an address
//! POST   /api/addresses/{id}/default    - Make an address the default
//! DELETE /api/addresses/{id}            - Delete an address
//!
//! # Checkout flow (JSON, requires login)
//! GET  /api/checkout/state              - Current step, selection and summary
//! POST /api/checkout/address            - Select the shipping address
//! POST /api/checkout/items              - Replace the item selection
//! POST /api/checkout/items/{id}/toggle  - Toggle one item
//! POST /api/checkout/next               - Advance (Review -> Payment places the order)
//! POST /api/checkout/back               - Return to an earlier step
//! POST /api/checkout                    - Payment details for an order
//!
//! # Payment
//! POST /api/payment/success             - Verify the modal's signed result (no login)
//! POST /api/payment/cancel              - Modal dismissed (requires login)
//! POST /api/payment/webhook             - Razorpay webhook (signature only)
//!
//! # Pages
//! GET  /checkout                        - Checkout page for the current step
//! GET  /orders/{id}/confirmation        - Order confirmation
//! ```

pub mod addresses;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod payment;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, payment_rate_limiter};
use crate::state::AppState;

/// Create the cart API router.
pub fn cart_routes() -> Router<AppState> {
    Router::new().route(
        "/",
        get(cart::index)
            .post(cart::add)
            .put(cart::update)
            .delete(cart::remove),
    )
}

/// Create the address API router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route("/{id}", axum::routing::delete(addresses::delete))
        .route("/{id}/default", post(addresses::set_default))
}

/// Create the checkout API router.
pub fn checkout_api_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::payment_details))
        .route("/state", get(checkout::state))
        .route("/address", post(checkout::select_address))
        .route("/items", post(checkout::select_items))
        .route("/items/{id}/toggle", post(checkout::toggle_item))
        .route("/next", post(checkout::next))
        .route("/back", post(checkout::back))
}

/// Create the payment callback router.
///
/// The webhook sits outside the rate limiter; Razorpay retries failed
/// deliveries and each one must be accepted.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/success", post(payment::success))
        .route("/cancel", post(payment::cancel))
        .layer(payment_rate_limiter())
        .route("/webhook", post(payment::webhook))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/cart", cart_routes().layer(api_rate_limiter()))
        .nest("/api/addresses", address_routes().layer(api_rate_limiter()))
        .nest(
            "/api/checkout",
            checkout_api_routes().layer(payment_rate_limiter()),
        )
        .nest("/api/payment", payment_routes())
        .route("/checkout", get(checkout::show))
        .route("/orders/{id}/confirmation", get(orders::confirmation))
}
