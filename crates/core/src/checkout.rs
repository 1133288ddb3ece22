//! Checkout state machine.
//!
//! ```text
//!   Address(1) ──address selected──▶ Review(2) ──items selected + order──▶ Payment(3)
//!       ▲                              ▲  │                                  │
//!       └──────────── back ────────────┴──┴────────────── back ──────────────┘
//! ```
//!
//! A [`CheckoutFlow`] is a plain value kept in the server-side session. Guards
//! never mutate on failure: a rejected transition leaves `step` untouched.
//! Selecting an address or toggling items is local to the flow; only entering
//! the payment step involves an order, which the caller creates and hands in
//! via [`CheckoutFlow::enter_payment`].
//!
//! Going back from Payment keeps the remembered order so that pressing
//! "Pay Now" again reuses it. Changing the address or item selection forgets
//! the order and rotates the idempotency key, because the next order must
//! reflect the new selection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AddressId, CartItemId, OrderId};

/// Reasons a checkout transition is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("select a delivery address to continue")]
    NoAddressSelected,
    #[error("select at least one item to continue")]
    NoItemsSelected,
    #[error("an order must be placed to enter the payment step")]
    OrderRequired,
    #[error("review the order before paying")]
    ReviewRequired,
    #[error("already at the payment step")]
    AlreadyAtPayment,
    #[error("cannot go back from step {from} to step {to}")]
    InvalidBack { from: u8, to: u8 },
    #[error("invalid checkout step: {0}")]
    UnknownStep(u8),
}

/// Checkout step, numbered as shown to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CheckoutStep {
    #[default]
    Address,
    Review,
    Payment,
}

impl CheckoutStep {
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Address => 1,
            Self::Review => 2,
            Self::Payment => 3,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Address => "Address",
            Self::Review => "Review",
            Self::Payment => "Payment",
        }
    }
}

impl TryFrom<u8> for CheckoutStep {
    type Error = TransitionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Address),
            2 => Ok(Self::Review),
            3 => Ok(Self::Payment),
            other => Err(TransitionError::UnknownStep(other)),
        }
    }
}

impl From<CheckoutStep> for u8 {
    fn from(step: CheckoutStep) -> Self {
        step.number()
    }
}

/// In-progress checkout for one customer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutFlow {
    step: CheckoutStep,
    selected_address: Option<AddressId>,
    selected_items: BTreeSet<CartItemId>,
    order_id: Option<OrderId>,
    idempotency_key: Uuid,
}

impl Default for CheckoutFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutFlow {
    /// Start a fresh checkout at the address step.
    #[must_use]
    pub fn new() -> Self {
        Self {
            step: CheckoutStep::Address,
            selected_address: None,
            selected_items: BTreeSet::new(),
            order_id: None,
            idempotency_key: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    #[must_use]
    pub const fn selected_address(&self) -> Option<AddressId> {
        self.selected_address
    }

    #[must_use]
    pub const fn selected_items(&self) -> &BTreeSet<CartItemId> {
        &self.selected_items
    }

    /// Order created when this flow last entered the payment step.
    #[must_use]
    pub const fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Key identifying this checkout attempt; orders are unique per key.
    #[must_use]
    pub const fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    pub fn select_address(&mut self, address: AddressId) {
        if self.selected_address != Some(address) {
            self.selected_address = Some(address);
            self.selection_changed();
        }
    }

    pub fn clear_address(&mut self) {
        if self.selected_address.take().is_some() {
            self.selection_changed();
        }
    }

    /// Toggle an item in or out of the selection. Returns whether it is now selected.
    pub fn toggle_item(&mut self, item: CartItemId) -> bool {
        let selected = if self.selected_items.remove(&item) {
            false
        } else {
            self.selected_items.insert(item);
            true
        };
        self.selection_changed();
        selected
    }

    /// Replace the whole item selection.
    pub fn set_items(&mut self, items: impl IntoIterator<Item = CartItemId>) {
        let items: BTreeSet<_> = items.into_iter().collect();
        if items != self.selected_items {
            self.selected_items = items;
            self.selection_changed();
        }
    }

    /// Drop items that are no longer in the cart (removed in another tab).
    pub fn retain_items(&mut self, in_cart: &BTreeSet<CartItemId>) {
        let before = self.selected_items.len();
        self.selected_items.retain(|id| in_cart.contains(id));
        if self.selected_items.len() != before {
            self.selection_changed();
        }
    }

    /// Check the guard for moving forward from the current step.
    ///
    /// # Errors
    ///
    /// Returns the unmet precondition, or `AlreadyAtPayment`.
    pub fn can_advance(&self) -> Result<CheckoutStep, TransitionError> {
        match self.step {
            CheckoutStep::Address if self.selected_address.is_none() => {
                Err(TransitionError::NoAddressSelected)
            }
            CheckoutStep::Address => Ok(CheckoutStep::Review),
            CheckoutStep::Review if self.selected_items.is_empty() => {
                Err(TransitionError::NoItemsSelected)
            }
            CheckoutStep::Review => Ok(CheckoutStep::Payment),
            CheckoutStep::Payment => Err(TransitionError::AlreadyAtPayment),
        }
    }

    /// Move Address → Review.
    ///
    /// Review → Payment needs an order and goes through [`Self::enter_payment`].
    ///
    /// # Errors
    ///
    /// Returns the failed guard; the step is left unchanged.
    pub fn advance(&mut self) -> Result<CheckoutStep, TransitionError> {
        match self.can_advance()? {
            CheckoutStep::Payment => Err(TransitionError::OrderRequired),
            next => {
                self.step = next;
                Ok(next)
            }
        }
    }

    /// Move Review → Payment, remembering the order created for this selection.
    ///
    /// # Errors
    ///
    /// Returns the failed guard; the step is left unchanged.
    pub fn enter_payment(&mut self, order_id: OrderId) -> Result<(), TransitionError> {
        match self.can_advance()? {
            CheckoutStep::Payment => {
                self.order_id = Some(order_id);
                self.step = CheckoutStep::Payment;
                Ok(())
            }
            _ => Err(TransitionError::ReviewRequired),
        }
    }

    /// Go back to an earlier step. Never cancels an existing order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBack` when `to` is not strictly before the current step.
    pub fn back_to(&mut self, to: CheckoutStep) -> Result<(), TransitionError> {
        if to >= self.step {
            return Err(TransitionError::InvalidBack {
                from: self.step.number(),
                to: to.number(),
            });
        }
        self.step = to;
        Ok(())
    }

    /// Forget the remembered order but keep the selection, so the next
    /// Review → Payment creates a new order. Used when the previous order
    /// can no longer be paid (expired or cancelled).
    pub fn renew_attempt(&mut self) {
        self.order_id = None;
        self.idempotency_key = Uuid::new_v4();
        if self.step == CheckoutStep::Payment {
            self.step = CheckoutStep::Review;
        }
    }

    /// Forget everything and start over with a fresh idempotency key.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn selection_changed(&mut self) {
        if self.order_id.take().is_some() {
            self.idempotency_key = Uuid::new_v4();
        }
        // The payment step is only valid for the selection it was entered with
        if self.step == CheckoutStep::Payment {
            self.step = CheckoutStep::Review;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_review() -> CheckoutFlow {
        let mut flow = CheckoutFlow::new();
        flow.select_address(AddressId::new(1));
        flow.advance().expect("address selected");
        flow
    }

    #[test]
    fn test_address_to_review_requires_address() {
        let mut flow = CheckoutFlow::new();

        assert_eq!(flow.advance(), Err(TransitionError::NoAddressSelected));
        assert_eq!(flow.step(), CheckoutStep::Address);

        flow.select_address(AddressId::new(4));
        assert_eq!(flow.advance(), Ok(CheckoutStep::Review));
        assert_eq!(flow.step(), CheckoutStep::Review);
    }

    #[test]
    fn test_review_to_payment_requires_items() {
        let mut flow = at_review();

        assert_eq!(
            flow.enter_payment(OrderId::new(1)),
            Err(TransitionError::NoItemsSelected)
        );
        assert_eq!(flow.step(), CheckoutStep::Review);
        assert_eq!(flow.order_id(), None);

        flow.toggle_item(CartItemId::new(10));
        flow.enter_payment(OrderId::new(1)).expect("items selected");
        assert_eq!(flow.step(), CheckoutStep::Payment);
        assert_eq!(flow.order_id(), Some(OrderId::new(1)));
    }

    #[test]
    fn test_advance_from_review_needs_an_order() {
        let mut flow = at_review();
        flow.toggle_item(CartItemId::new(10));

        assert_eq!(flow.can_advance(), Ok(CheckoutStep::Payment));
        assert_eq!(flow.advance(), Err(TransitionError::OrderRequired));
        assert_eq!(flow.step(), CheckoutStep::Review);
    }

    #[test]
    fn test_cannot_enter_payment_from_address() {
        let mut flow = CheckoutFlow::new();
        flow.toggle_item(CartItemId::new(10));

        assert_eq!(
            flow.enter_payment(OrderId::new(1)),
            Err(TransitionError::NoAddressSelected)
        );
        assert_eq!(flow.step(), CheckoutStep::Address);
    }

    #[test]
    fn test_back_from_payment_keeps_order() {
        let mut flow = at_review();
        flow.toggle_item(CartItemId::new(10));
        flow.enter_payment(OrderId::new(7)).expect("enter payment");
        let key = flow.idempotency_key();

        flow.back_to(CheckoutStep::Review).expect("back allowed");
        assert_eq!(flow.step(), CheckoutStep::Review);
        assert_eq!(flow.order_id(), Some(OrderId::new(7)));
        assert_eq!(flow.idempotency_key(), key);

        flow.enter_payment(OrderId::new(7)).expect("re-enter payment");
        flow.back_to(CheckoutStep::Address).expect("back allowed");
        assert_eq!(flow.step(), CheckoutStep::Address);
    }

    #[test]
    fn test_back_must_go_backwards() {
        let mut flow = at_review();
        assert_eq!(
            flow.back_to(CheckoutStep::Payment),
            Err(TransitionError::InvalidBack { from: 2, to: 3 })
        );
        assert_eq!(
            flow.back_to(CheckoutStep::Review),
            Err(TransitionError::InvalidBack { from: 2, to: 2 })
        );
        assert_eq!(flow.step(), CheckoutStep::Review);
    }

    #[test]
    fn test_changing_selection_forgets_order_and_rotates_key() {
        let mut flow = at_review();
        flow.toggle_item(CartItemId::new(10));
        flow.enter_payment(OrderId::new(7)).expect("enter payment");
        let key = flow.idempotency_key();

        flow.toggle_item(CartItemId::new(11));

        assert_eq!(flow.order_id(), None);
        assert_ne!(flow.idempotency_key(), key);
        assert_eq!(flow.step(), CheckoutStep::Review);
    }

    #[test]
    fn test_reselecting_same_address_is_not_a_change() {
        let mut flow = at_review();
        flow.toggle_item(CartItemId::new(10));
        flow.enter_payment(OrderId::new(7)).expect("enter payment");

        flow.select_address(AddressId::new(1));
        assert_eq!(flow.order_id(), Some(OrderId::new(7)));
        assert_eq!(flow.step(), CheckoutStep::Payment);
    }

    #[test]
    fn test_retain_items_drops_missing_cart_lines() {
        let mut flow = at_review();
        flow.set_items([CartItemId::new(1), CartItemId::new(2)]);

        let in_cart: BTreeSet<_> = [CartItemId::new(2)].into_iter().collect();
        flow.retain_items(&in_cart);

        assert_eq!(flow.selected_items(), &in_cart);
    }

    #[test]
    fn test_toggle_reports_selection() {
        let mut flow = CheckoutFlow::new();
        assert!(flow.toggle_item(CartItemId::new(3)));
        assert!(!flow.toggle_item(CartItemId::new(3)));
        assert!(flow.selected_items().is_empty());
    }

    #[test]
    fn test_step_serializes_as_number() {
        let json = serde_json::to_string(&CheckoutStep::Review).expect("serialize");
        assert_eq!(json, "2");
        assert!(serde_json::from_str::<CheckoutStep>("4").is_err());
    }

    #[test]
    fn test_flow_survives_session_round_trip() {
        let mut flow = at_review();
        flow.toggle_item(CartItemId::new(10));

        let json = serde_json::to_value(&flow).expect("serialize");
        let back: CheckoutFlow = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, flow);
    }

    #[test]
    fn test_renew_attempt_keeps_selection() {
        let mut flow = at_review();
        flow.toggle_item(CartItemId::new(10));
        flow.enter_payment(OrderId::new(5)).expect("items selected");
        let old_key = flow.idempotency_key();

        flow.renew_attempt();

        assert_eq!(flow.order_id(), None);
        assert_ne!(flow.idempotency_key(), old_key);
        assert_eq!(flow.step(), CheckoutStep::Review);
        assert_eq!(flow.selected_address(), Some(AddressId::new(1)));
        assert!(flow.selected_items().contains(&CartItemId::new(10)));
    }
}
