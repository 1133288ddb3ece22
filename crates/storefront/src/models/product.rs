//! Catalog products as seen by checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::ProductId;

/// A sellable product. Checkout only ever writes `stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub title: String,
    pub price: Decimal,
    pub discount_percentage: Decimal,
    pub stock: i32,
}

/// A product entry in a seed file.
///
/// ```yaml
/// - sku: TEA-ASSAM-250
///   title: Assam Tea 250g
///   price: "500.00"
///   discount_percentage: "10"
///   stock: 25
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSeed {
    pub sku: String,
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percentage: Decimal,
    #[serde(default)]
    pub stock: i32,
}
