//! Cart lines joined with their products.

use rust_decimal::Decimal;
use serde::Serialize;

use bazaar_core::{CartItemId, LineItemPrice, PricingError, ProductId};

/// Most units of one product a cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// A cart line with the live product data needed to price it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
    pub stock: i32,
}

impl CartLine {
    /// Pricing input for this line at the product's current price.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::ZeroQuantity` for a non-positive quantity.
    pub fn price(&self) -> Result<LineItemPrice, PricingError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| PricingError::ZeroQuantity)?;
        Ok(LineItemPrice::new(
            self.unit_price,
            self.discount_percentage,
            quantity,
        ))
    }

    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock >= self.quantity
    }
}
