//! Business logic services for storefront.
//!
//! # Services
//!
//! - `checkout` - Order placement, gateway handoff and payment settlement

pub mod checkout;

pub use checkout::{CheckoutError, CheckoutService};
