//! Type-safe money representation using decimal arithmetic.
//!
//! Amounts are held in the currency's standard unit (rupees, not paise) as a
//! [`Decimal`]. Payment gateways want minor units, so [`Money::to_minor_units`]
//! is the only sanctioned way to produce the integer sent over the wire.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors converting money to or from minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// Amount is below zero.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// Amount has more precision than the currency's minor unit.
    #[error("amount {0} is not a whole number of minor units")]
    FractionalMinorUnits(Decimal),
    /// Amount does not fit into an `i64` of minor units.
    #[error("amount {0} is too large")]
    Overflow(Decimal),
}

/// ISO 4217 currency codes accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[allow(clippy::upper_case_acronyms)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol (e.g. `₹`).
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Three-letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    /// Number of minor units per standard unit (paise per rupee, cents per dollar).
    #[must_use]
    pub const fn minor_units_per_unit(self) -> i64 {
        match self {
            Self::INR | Self::USD | Self::EUR | Self::GBP => 100,
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// An amount of money in a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
    amount: Decimal,
    /// ISO 4217 currency code.
    currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Build from an integer count of minor units (paise, cents).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency: CurrencyCode) -> Self {
        Self::new(
            Decimal::from(minor) / Decimal::from(currency.minor_units_per_unit()),
            currency,
        )
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Convert to the integer minor-unit amount a payment gateway expects.
    ///
    /// # Errors
    ///
    /// Fails for negative amounts, for amounts with sub-minor-unit precision
    /// (the caller must round first) and for amounts that overflow `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(MoneyError::Negative(self.amount));
        }

        let scaled = self
            .amount
            .checked_mul(Decimal::from(self.currency.minor_units_per_unit()))
            .ok_or(MoneyError::Overflow(self.amount))?;

        if !scaled.fract().is_zero() {
            return Err(MoneyError::FractionalMinorUnits(self.amount));
        }

        scaled.to_i64().ok_or(MoneyError::Overflow(self.amount))
    }

    /// Format for display with two decimals (e.g., `₹900.00`).
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency.symbol(), self.amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_minor_units_for_rupees() {
        let money = Money::new(dec!(900.00), CurrencyCode::INR);
        assert_eq!(money.to_minor_units(), Ok(90000));

        let money = Money::new(dec!(0.5), CurrencyCode::INR);
        assert_eq!(money.to_minor_units(), Ok(50));
    }

    #[test]
    fn test_minor_units_rejects_unrounded_amounts() {
        let money = Money::new(dec!(10.005), CurrencyCode::INR);
        assert!(matches!(
            money.to_minor_units(),
            Err(MoneyError::FractionalMinorUnits(_))
        ));
    }

    #[test]
    fn test_minor_units_rejects_negative() {
        let money = Money::new(dec!(-1), CurrencyCode::INR);
        assert!(matches!(money.to_minor_units(), Err(MoneyError::Negative(_))));
    }

    #[test]
    fn test_from_minor_units_round_trips_display() {
        let money = Money::from_minor_units(90000, CurrencyCode::INR);
        assert_eq!(money.amount(), dec!(900));
        assert_eq!(money.display(), "₹900.00");
    }

    #[test]
    fn test_display_pads_to_two_decimals() {
        assert_eq!(Money::new(dec!(12.5), CurrencyCode::USD).display(), "$12.50");
        assert_eq!(Money::zero(CurrencyCode::INR).to_string(), "₹0.00");
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("inr".parse::<CurrencyCode>(), Ok(CurrencyCode::INR));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::default(), CurrencyCode::INR);
    }
}
