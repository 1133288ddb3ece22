//! Order lifecycle status.
//!
//! ```text
//! PENDING ──(verified payment)──▶ PAID
//!    │
//!    └──(expiry / explicit cancel)──▶ CANCELLED
//! ```
//!
//! `PAID` and `CANCELLED` are terminal. A payment callback is settled against
//! the status read under a row lock via [`OrderStatus::settle`], which is what
//! makes duplicate callbacks harmless.

use serde::{Deserialize, Serialize};

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created with locked prices, awaiting a verified payment.
    #[default]
    Pending,
    /// Gateway-verified payment received.
    Paid,
    /// Abandoned or cancelled before payment.
    Cancelled,
}

/// What a verified payment callback should do to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// First verified callback: mark paid and decrement stock.
    Apply,
    /// Order is already paid: succeed without side effects.
    AlreadyPaid,
    /// Order was cancelled: money may have moved, needs a human.
    Rejected,
}

impl OrderStatus {
    /// Decide how a verified payment settles against this status.
    #[must_use]
    pub const fn settle(self) -> Settlement {
        match self {
            Self::Pending => Settlement::Apply,
            Self::Paid => Settlement::AlreadyPaid,
            Self::Cancelled => Settlement::Rejected,
        }
    }

    /// Only pending orders may be cancelled or expired.
    #[must_use]
    pub const fn can_cancel(self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}
