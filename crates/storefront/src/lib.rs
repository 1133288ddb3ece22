//! Bazaar Storefront library.
//!
//! Cart, checkout and Razorpay payment handling for the marketplace, exposed
//! as a library so the binary, the CLI and the tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod razorpay;
pub mod reaper;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;
