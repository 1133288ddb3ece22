//! Domain models for storefront.
//!
//! Rows are read with `sqlx::FromRow`; typed IDs and [`OrderStatus`] decode
//! directly through the `postgres` feature of `bazaar-core`.
//!
//! [`OrderStatus`]: bazaar_core::OrderStatus

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod session;

pub use address::{Address, AddressError, AddressInput};
pub use cart::{CartLine, MAX_LINE_QUANTITY};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, PaymentOutcome};
pub use product::{Product, ProductSeed};
pub use session::{CurrentUser, keys as session_keys};
