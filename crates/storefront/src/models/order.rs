//! Orders and their price-locked items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use bazaar_core::pricing::order_total;
use bazaar_core::{
    AddressId, CurrencyCode, LineItemPrice, Money, OrderId, OrderStatus, PricingError, ProductId,
    UserId,
};

/// An order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub address_id: AddressId,
    #[serde(skip)]
    pub idempotency_key: Uuid,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: String,
    pub razorpay_order_id: Option<String>,
    #[serde(skip)]
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub abandoned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Currency the order was priced in.
    ///
    /// # Errors
    ///
    /// Returns the unparsed code if the stored currency is unknown.
    pub fn currency_code(&self) -> Result<CurrencyCode, String> {
        self.currency.parse()
    }

    /// Stored total as money.
    ///
    /// # Errors
    ///
    /// Returns the unparsed code if the stored currency is unknown.
    pub fn total_money(&self) -> Result<Money, String> {
        Ok(Money::new(self.total, self.currency_code()?))
    }
}

/// A line of an order, with the price and discount captured at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
}

impl OrderItem {
    /// Pricing input at the locked price.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::ZeroQuantity` for a non-positive stored quantity.
    pub fn price(&self) -> Result<LineItemPrice, PricingError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| PricingError::ZeroQuantity)?;
        Ok(LineItemPrice::new(
            self.unit_price,
            self.discount_percentage,
            quantity,
        ))
    }
}

/// Total of a set of stored items, using the same function as checkout.
///
/// # Errors
///
/// Returns a `PricingError` if any stored line is invalid.
pub fn locked_total(items: &[OrderItem], currency: CurrencyCode) -> Result<Money, PricingError> {
    let prices = items
        .iter()
        .map(OrderItem::price)
        .collect::<Result<Vec<_>, _>>()?;
    order_total(&prices, currency)
}

/// An order about to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub idempotency_key: Uuid,
    pub currency: CurrencyCode,
    pub items: Vec<NewOrderItem>,
}

/// A line about to be inserted, prices copied from the product.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
}

impl NewOrderItem {
    #[must_use]
    pub const fn price(&self) -> LineItemPrice {
        LineItemPrice::new(self.unit_price, self.discount_percentage, self.quantity)
    }
}

impl NewOrder {
    /// The total to store on the order.
    ///
    /// # Errors
    ///
    /// Returns a `PricingError` for invalid lines.
    pub fn total(&self) -> Result<Money, PricingError> {
        let prices: Vec<_> = self.items.iter().map(NewOrderItem::price).collect();
        order_total(&prices, self.currency)
    }
}

/// Result of settling a verified payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// This call marked the order paid and decremented stock.
    Completed,
    /// The order was already paid; nothing changed.
    AlreadyPaid,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn item(unit_price: Decimal, discount: Decimal, quantity: i32) -> OrderItem {
        OrderItem {
            order_id: OrderId::new(1),
            product_id: ProductId::new(1),
            title: "Assam Tea".to_string(),
            quantity,
            unit_price,
            discount_percentage: discount,
        }
    }

    #[test]
    fn test_new_order_total_matches_locked_total() {
        let new_order = NewOrder {
            user_id: UserId::new(1),
            address_id: AddressId::new(1),
            idempotency_key: Uuid::new_v4(),
            currency: CurrencyCode::INR,
            items: vec![NewOrderItem {
                product_id: ProductId::new(1),
                title: "Assam Tea".to_string(),
                quantity: 2,
                unit_price: dec!(500),
                discount_percentage: dec!(10),
            }],
        };

        let at_creation = new_order.total().expect("priced");
        let stored = locked_total(&[item(dec!(500), dec!(10), 2)], CurrencyCode::INR)
            .expect("priced");

        assert_eq!(at_creation, stored);
        assert_eq!(stored.to_minor_units(), Ok(90000));
    }

    #[test]
    fn test_negative_stored_quantity_is_rejected() {
        assert_eq!(
            item(dec!(1), dec!(0), -1).price(),
            Err(PricingError::ZeroQuantity)
        );
    }
}
