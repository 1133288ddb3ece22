//! Order pricing.
//!
//! Every total a customer sees and every amount sent to the payment gateway
//! comes from [`order_total`]. The formula is
//!
//! ```text
//! total = round2( Σ unit_price × (1 − discount_percentage / 100) × quantity )
//! ```
//!
//! evaluated in exact decimal arithmetic and rounded once, at the end, half
//! away from zero. Orders store the inputs (unit price and discount) at
//! creation time, so re-running this function over an order's items always
//! reproduces the stored total regardless of later catalog price changes.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::types::{CurrencyCode, Money};

/// Errors raised while pricing line items.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("unit price cannot be negative: {0}")]
    NegativePrice(Decimal),
    #[error("discount must be between 0 and 100 percent, got {0}")]
    DiscountOutOfRange(Decimal),
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("order total overflowed")]
    Overflow,
}

/// The inputs needed to price one line of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemPrice {
    /// List price per unit in the currency's standard unit.
    pub unit_price: Decimal,
    /// Percentage off the list price, `0..=100`.
    pub discount_percentage: Decimal,
    pub quantity: u32,
}

impl LineItemPrice {
    #[must_use]
    pub const fn new(unit_price: Decimal, discount_percentage: Decimal, quantity: u32) -> Self {
        Self {
            unit_price,
            discount_percentage,
            quantity,
        }
    }

    fn validate(&self) -> Result<(), PricingError> {
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(PricingError::NegativePrice(self.unit_price));
        }
        if self.discount_percentage < Decimal::ZERO
            || self.discount_percentage > Decimal::ONE_HUNDRED
        {
            return Err(PricingError::DiscountOutOfRange(self.discount_percentage));
        }
        if self.quantity == 0 {
            return Err(PricingError::ZeroQuantity);
        }
        Ok(())
    }
}

/// Price of a single unit after its discount, unrounded.
///
/// # Errors
///
/// Returns an error for a negative price or a discount outside `0..=100`.
pub fn discounted_unit_price(
    unit_price: Decimal,
    discount_percentage: Decimal,
) -> Result<Decimal, PricingError> {
    LineItemPrice::new(unit_price, discount_percentage, 1).validate()?;

    let keep = Decimal::ONE
        .checked_sub(discount_percentage / Decimal::ONE_HUNDRED)
        .ok_or(PricingError::Overflow)?;
    unit_price.checked_mul(keep).ok_or(PricingError::Overflow)
}

/// Total for one line, unrounded.
///
/// # Errors
///
/// Returns an error when the line fails validation or the product overflows.
pub fn line_total(item: &LineItemPrice) -> Result<Decimal, PricingError> {
    item.validate()?;
    discounted_unit_price(item.unit_price, item.discount_percentage)?
        .checked_mul(Decimal::from(item.quantity))
        .ok_or(PricingError::Overflow)
}

/// Total for an order, rounded to two decimal places.
///
/// An empty iterator prices to zero; callers that require at least one line
/// check that themselves.
///
/// # Errors
///
/// Returns the first line's validation error, or `Overflow`.
pub fn order_total<'a>(
    items: impl IntoIterator<Item = &'a LineItemPrice>,
    currency: CurrencyCode,
) -> Result<Money, PricingError> {
    let mut sum = Decimal::ZERO;
    for item in items {
        sum = sum
            .checked_add(line_total(item)?)
            .ok_or(PricingError::Overflow)?;
    }

    Ok(Money::new(
        sum.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        currency,
    ))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_happy_path_amount_in_paise() {
        // ₹500, 10% off, quantity 2
        let items = [LineItemPrice::new(dec!(500), dec!(10), 2)];
        let total = order_total(&items, CurrencyCode::INR).expect("priced");

        assert_eq!(total.amount(), dec!(900));
        assert_eq!(total.to_minor_units(), Ok(90000));
        assert_eq!(total.display(), "₹900.00");
    }

    #[test]
    fn test_total_sums_lines() {
        let items = [
            LineItemPrice::new(dec!(199.99), dec!(0), 3),
            LineItemPrice::new(dec!(49.50), dec!(20), 1),
        ];
        let total = order_total(&items, CurrencyCode::INR).expect("priced");
        // 599.97 + 39.60
        assert_eq!(total.amount(), dec!(639.57));
    }

    #[test]
    fn test_rounding_happens_once_at_the_end() {
        // Each line is 0.333..., rounding per line would give 0.99
        let items = [
            LineItemPrice::new(dec!(1), dec!(66.666666666666666666666666), 1),
            LineItemPrice::new(dec!(1), dec!(66.666666666666666666666666), 1),
            LineItemPrice::new(dec!(1), dec!(66.666666666666666666666666), 1),
        ];
        let total = order_total(&items, CurrencyCode::INR).expect("priced");
        assert_eq!(total.amount(), dec!(1.00));
    }

    #[test]
    fn test_half_paisa_rounds_away_from_zero() {
        let items = [LineItemPrice::new(dec!(0.125), dec!(0), 1)];
        let total = order_total(&items, CurrencyCode::INR).expect("priced");
        assert_eq!(total.amount(), dec!(0.13));
    }

    #[test]
    fn test_full_discount_is_free() {
        let items = [LineItemPrice::new(dec!(250), dec!(100), 4)];
        let total = order_total(&items, CurrencyCode::INR).expect("priced");
        assert!(total.amount().is_zero());
    }

    #[test]
    fn test_empty_order_prices_to_zero() {
        let total = order_total(std::iter::empty(), CurrencyCode::INR).expect("priced");
        assert_eq!(total.to_minor_units(), Ok(0));
    }

    #[test]
    fn test_invalid_lines_are_rejected() {
        assert_eq!(
            line_total(&LineItemPrice::new(dec!(-1), dec!(0), 1)),
            Err(PricingError::NegativePrice(dec!(-1)))
        );
        assert_eq!(
            line_total(&LineItemPrice::new(dec!(10), dec!(101), 1)),
            Err(PricingError::DiscountOutOfRange(dec!(101)))
        );
        assert_eq!(
            line_total(&LineItemPrice::new(dec!(10), dec!(0), 0)),
            Err(PricingError::ZeroQuantity)
        );
    }

    #[test]
    fn test_locked_prices_reproduce_stored_total() {
        // Prices captured at order time
        let locked = [LineItemPrice::new(dec!(500), dec!(10), 2)];
        let stored = order_total(&locked, CurrencyCode::INR).expect("priced");

        // Catalog price changes afterwards must not affect the locked lines
        let live = [LineItemPrice::new(dec!(650), dec!(0), 2)];
        let live_total = order_total(&live, CurrencyCode::INR).expect("priced");

        assert_ne!(stored, live_total);
        assert_eq!(order_total(&locked, CurrencyCode::INR), Ok(stored));
    }
}
