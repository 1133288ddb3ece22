//! Bazaar Core - Shared domain types for the marketplace checkout.
//!
//! This crate provides the types and pure logic used by every Bazaar component:
//! - `storefront` - Cart, checkout and payment HTTP service
//! - `cli` - Command-line tools for migrations, seeding and order maintenance
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Anything that decides money or order state lives
//! here so that the storefront's display path and its charge path share a
//! single implementation.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, contact details and order statuses
//! - [`pricing`] - Line and order totals with discount handling
//! - [`checkout`] - The Address → Review → Payment state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod pricing;
pub mod types;

pub use checkout::{CheckoutFlow, CheckoutStep, TransitionError};
pub use pricing::{LineItemPrice, PricingError};
pub use types::*;
