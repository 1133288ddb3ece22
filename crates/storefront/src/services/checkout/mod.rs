//! Checkout orchestration.
//!
//! Turns a [`CheckoutFlow`] into a PENDING order with locked prices, hands the
//! order to Razorpay, and settles the signed payment callback.
//!
//! Every amount comes from [`bazaar_core::pricing`]: the review summary, the
//! stored order total and the amount sent to the gateway all go through the
//! same function, so what the customer sees is what they are charged.

mod error;

pub use error::{CheckoutError, ErrorKind};

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

use bazaar_core::pricing::{discounted_unit_price, line_total, order_total};
use bazaar_core::{
    AddressId, CartItemId, CheckoutFlow, CheckoutStep, CurrencyCode, LineItemPrice, Money, OrderId,
    OrderStatus, PricingError, ProductId, TransitionError, UserId,
};

use crate::config::StorefrontConfig;
use crate::db::{
    AddressRepository, CartRepository, OrderRepository, RepositoryError, UserRepository,
};
use crate::models::order::locked_total;
use crate::models::{CartLine, NewOrder, NewOrderItem, Order, OrderItem, PaymentOutcome};
use crate::razorpay::{
    CheckoutOptions, CreateOrderRequest, Prefill, RazorpayClient, SignatureError, Theme,
    WebhookEvent, verify_webhook_signature,
};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// One priced line of the review summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryLine {
    /// The cart line this row prices; `None` for a placed order's items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<CartItemId>,
    pub product_id: ProductId,
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_percentage: Decimal,
    /// Unit price after discount, rounded for display.
    pub discounted_price: Decimal,
    /// Line total rounded for display; the order total is rounded once from
    /// the exact line totals.
    pub line_total: Decimal,
    pub in_stock: bool,
}

/// The priced view of the selected cart lines, or of a placed order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSummary {
    pub lines: Vec<SummaryLine>,
    /// Priced from an order's locked items rather than live catalog prices.
    pub locked: bool,
    pub total: Decimal,
    pub currency: CurrencyCode,
    /// Total formatted for display, e.g. `₹900.00`.
    pub total_display: String,
    /// Total in minor units, the amount the gateway will charge.
    pub amount: i64,
}

/// What the browser needs to open the payment modal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(skip)]
    pub order_id: OrderId,
    /// Minor units (paise).
    pub amount: i64,
    pub currency: String,
    pub razorpay_order_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl PaymentDetails {
    /// Options for `new Razorpay(...)`.
    #[must_use]
    pub fn checkout_options(&self, key_id: &str, store_name: &str) -> CheckoutOptions {
        CheckoutOptions {
            key: key_id.to_string(),
            amount: self.amount,
            currency: self.currency.clone(),
            name: store_name.to_string(),
            description: format!("Order #{}", self.order_id),
            order_id: self.razorpay_order_id.clone(),
            prefill: Prefill {
                name: self.name.clone(),
                email: self.email.clone(),
                contact: self.phone.clone(),
            },
            notes: BTreeMap::from([("order_id".to_string(), self.order_id.to_string())]),
            theme: Theme::default(),
        }
    }
}

/// The values the Razorpay modal hands back on success, plus our order id.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    #[serde(rename = "orderId")]
    pub order_id: OrderId,
    #[serde(rename = "paymentIntentId", alias = "razorpay_payment_id")]
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
}

/// What a webhook delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Settled(PaymentOutcome),
    /// Event type or order we do not act on.
    Ignored,
}

// =============================================================================
// Service
// =============================================================================

/// Checkout service.
///
/// Borrows the pool, gateway client and configuration for one request.
pub struct CheckoutService<'a> {
    carts: CartRepository<'a>,
    addresses: AddressRepository<'a>,
    orders: OrderRepository<'a>,
    users: UserRepository<'a>,
    razorpay: &'a RazorpayClient,
    config: &'a StorefrontConfig,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        razorpay: &'a RazorpayClient,
        config: &'a StorefrontConfig,
    ) -> Self {
        Self {
            carts: CartRepository::new(pool),
            addresses: AddressRepository::new(pool),
            orders: OrderRepository::new(pool),
            users: UserRepository::new(pool),
            razorpay,
            config,
        }
    }

    /// Create a checkout service from application state.
    #[must_use]
    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(state.pool(), state.razorpay(), state.config())
    }

    const fn currency(&self) -> CurrencyCode {
        self.config.checkout.currency
    }

    // =========================================================================
    // Review → Payment
    // =========================================================================

    /// Create (or find) the PENDING order for this checkout attempt and move
    /// the flow into the payment step.
    ///
    /// Retrying with the same flow returns the same order. If the remembered
    /// order can no longer be paid because it expired, a new attempt is
    /// started for the same selection.
    ///
    /// # Errors
    ///
    /// Returns the failed step guard, `AddressNotFound`, `ItemsUnavailable`
    /// or `OutOfStock`. The flow is unchanged on error.
    #[instrument(skip(self, flow))]
    pub async fn place_order(
        &self,
        user: UserId,
        flow: &mut CheckoutFlow,
    ) -> Result<Order, CheckoutError> {
        match flow.can_advance()? {
            CheckoutStep::Payment => {}
            _ => return Err(TransitionError::ReviewRequired.into()),
        }

        let address_id = flow
            .selected_address()
            .ok_or(TransitionError::NoAddressSelected)?;
        self.addresses
            .get(user, address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound)?;

        let selected: Vec<CartItemId> = flow.selected_items().iter().copied().collect();
        let lines = self.carts.lines_for_checkout(user, &selected).await?;
        if lines.len() != selected.len() {
            return Err(CheckoutError::ItemsUnavailable);
        }
        if let Some(short) = lines.iter().find(|line| !line.in_stock()) {
            return Err(CheckoutError::OutOfStock {
                title: short.title.clone(),
                available: short.stock,
            });
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let price = line.price()?;
            items.push(NewOrderItem {
                product_id: line.product_id,
                title: line.title.clone(),
                quantity: price.quantity,
                unit_price: line.unit_price,
                discount_percentage: line.discount_percentage,
            });
        }

        let mut attempt = flow.clone();
        let mut order = self
            .create_pending(user, address_id, &attempt, items.clone())
            .await?;

        if order.status == OrderStatus::Cancelled {
            info!(order_id = %order.id, "Previous order for this attempt was cancelled, starting a new one");
            attempt.renew_attempt();
            order = self
                .create_pending(user, address_id, &attempt, items)
                .await?;
        }

        if order.status != OrderStatus::Pending {
            return Err(CheckoutError::OrderNotPayable(order.status));
        }

        attempt.enter_payment(order.id)?;
        *flow = attempt;

        info!(order_id = %order.id, total = %order.total, "Order ready for payment");
        Ok(order)
    }

    async fn create_pending(
        &self,
        user: UserId,
        address_id: AddressId,
        flow: &CheckoutFlow,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, CheckoutError> {
        let new_order = NewOrder {
            user_id: user,
            address_id,
            idempotency_key: flow.idempotency_key(),
            currency: self.currency(),
            items,
        };
        // Validate before touching the database
        new_order.total()?;

        Ok(self.orders.create_pending(&new_order).await?)
    }

    /// Price a placed order from its locked items, the amount the gateway
    /// will charge.
    ///
    /// Returns `None` when the order is gone or cancelled, so the caller
    /// falls back to pricing the cart.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on database failure or `Pricing` for an invalid
    /// stored line.
    #[instrument(skip(self))]
    pub async fn locked_summary(
        &self,
        user: UserId,
        order_id: OrderId,
    ) -> Result<Option<CheckoutSummary>, CheckoutError> {
        let Some(order) = self.orders.get_for_user(order_id, user).await? else {
            return Ok(None);
        };
        if order.status == OrderStatus::Cancelled {
            return Ok(None);
        }

        let currency = order.currency_code().map_err(|e| {
            CheckoutError::Repository(RepositoryError::DataCorruption(e))
        })?;
        let items = self.orders.items(order.id).await?;
        price_order_items(&items, currency).map(Some)
    }

    // =========================================================================
    // Payment handoff
    // =========================================================================

    /// Load what the browser needs to open the payment modal.
    ///
    /// The amount is recomputed from the order's locked items; a Razorpay
    /// order is created and stored the first time, then reused.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, `OrderNotPayable`, `Gateway` if Razorpay is
    /// unreachable, or `TotalMismatch` if the stored total disagrees with
    /// the locked items.
    #[instrument(skip(self))]
    pub async fn payment_details(
        &self,
        user: UserId,
        order_id: OrderId,
    ) -> Result<PaymentDetails, CheckoutError> {
        let order = self
            .orders
            .get_for_user(order_id, user)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.status != OrderStatus::Pending {
            return Err(CheckoutError::OrderNotPayable(order.status));
        }

        let amount = self.locked_amount(&order).await?;

        let razorpay_order_id = match order.razorpay_order_id.clone() {
            Some(existing) => existing,
            None => self.create_gateway_order(&order, amount).await?,
        };

        let address = self.addresses.get(user, order.address_id).await?;
        let contact = self.users.get_contact(user).await?;

        let name = address
            .as_ref()
            .map(|a| a.name.clone())
            .or_else(|| contact.as_ref().and_then(|c| c.name.clone()))
            .unwrap_or_default();
        let phone = address.map(|a| a.phone).unwrap_or_default();
        let email = contact
            .map(|c| c.email.as_str().to_string())
            .unwrap_or_default();

        Ok(PaymentDetails {
            order_id,
            amount: amount.to_minor_units()?,
            currency: amount.currency().code().to_string(),
            razorpay_order_id,
            name,
            email,
            phone,
        })
    }

    /// Recompute an order's total from its locked items.
    async fn locked_amount(&self, order: &Order) -> Result<Money, CheckoutError> {
        let currency = order.currency_code().map_err(|e| {
            CheckoutError::Repository(RepositoryError::DataCorruption(e))
        })?;
        let items = self.orders.items(order.id).await?;
        let computed = locked_total(&items, currency)?;

        if computed.amount() != order.total {
            error!(
                order_id = %order.id,
                stored = %order.total,
                computed = %computed.amount(),
                "Order total does not match its locked items"
            );
            return Err(CheckoutError::TotalMismatch {
                stored: order.total,
                computed: computed.amount(),
            });
        }

        Ok(computed)
    }

    async fn create_gateway_order(
        &self,
        order: &Order,
        amount: Money,
    ) -> Result<String, CheckoutError> {
        let request = CreateOrderRequest {
            amount: amount.to_minor_units()?,
            currency: amount.currency().code().to_string(),
            receipt: format!("order_{}", order.id),
            notes: BTreeMap::from([("order_id".to_string(), order.id.to_string())]),
        };
        let created = self.razorpay.create_order(&request).await?;

        let stored = self
            .orders
            .attach_gateway_order(order.id, &created.id)
            .await?;
        if stored != created.id {
            // Another request attached first; ours is never shown to a customer
            debug!(
                order_id = %order.id,
                unused = %created.id,
                razorpay_order_id = %stored,
                "Gateway order already attached"
            );
        } else {
            info!(order_id = %order.id, razorpay_order_id = %stored, "Gateway order attached");
        }

        Ok(stored)
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Settle a payment reported by the browser.
    ///
    /// The signature is checked before anything else. Repeating a valid
    /// confirmation returns `PaymentOutcome::AlreadyPaid` without side effects.
    ///
    /// # Errors
    ///
    /// Fails closed with `Signature`, `GatewayOrderMismatch`, `PaidAfterCancel`
    /// or `StockExhausted`; the order is not marked paid in any error case.
    #[instrument(
        skip(self, confirmation),
        fields(
            order_id = %confirmation.order_id,
            razorpay_order_id = %confirmation.razorpay_order_id,
            razorpay_payment_id = %confirmation.razorpay_payment_id,
        )
    )]
    pub async fn confirm_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<PaymentOutcome, CheckoutError> {
        self.razorpay.verify_payment(
            &confirmation.razorpay_order_id,
            &confirmation.razorpay_payment_id,
            &confirmation.razorpay_signature,
        )?;

        let order = self
            .orders
            .get(confirmation.order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.razorpay_order_id.as_deref() != Some(confirmation.razorpay_order_id.as_str()) {
            return Err(CheckoutError::GatewayOrderMismatch {
                order_id: order.id.to_string(),
                received: confirmation.razorpay_order_id.clone(),
            });
        }

        self.settle(order.id, &confirmation.razorpay_payment_id)
            .await
    }

    async fn settle(
        &self,
        order_id: OrderId,
        razorpay_payment_id: &str,
    ) -> Result<PaymentOutcome, CheckoutError> {
        let outcome = self
            .orders
            .mark_paid(order_id, razorpay_payment_id)
            .await?;

        match outcome {
            PaymentOutcome::Completed => {
                info!(order_id = %order_id, razorpay_payment_id, "Order paid");
            }
            PaymentOutcome::AlreadyPaid => {
                debug!(order_id = %order_id, "Duplicate payment confirmation ignored");
            }
        }
        Ok(outcome)
    }

    /// Record that the customer closed the payment modal.
    ///
    /// The order stays PENDING with its gateway order, so "Pay Now" resumes
    /// it without creating another.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` if the order is not the user's.
    #[instrument(skip(self))]
    pub async fn cancel_payment(
        &self,
        user: UserId,
        order_id: OrderId,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .orders
            .mark_abandoned(order_id, user)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CheckoutError::OrderNotFound,
                other => other.into(),
            })?;

        info!(status = %order.status, "Payment modal dismissed");
        Ok(order)
    }

    /// Settle a payment delivered by Razorpay webhook.
    ///
    /// # Errors
    ///
    /// Returns `WebhookDisabled` without a configured secret, `Signature`
    /// for an unsigned or forged body, and the same settlement errors as
    /// [`Self::confirm_payment`].
    #[instrument(skip_all)]
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, CheckoutError> {
        let secret = self
            .config
            .razorpay
            .webhook_secret
            .as_ref()
            .ok_or(CheckoutError::WebhookDisabled)?;
        let signature = signature.ok_or(SignatureError::Missing)?;
        verify_webhook_signature(body, signature, secret)?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| CheckoutError::WebhookPayload(e.to_string()))?;

        let Some((razorpay_order_id, razorpay_payment_id)) = event.captured_payment() else {
            debug!(event = %event.event, "Webhook event ignored");
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(order) = self.orders.find_by_gateway_order(razorpay_order_id).await? else {
            warn!(razorpay_order_id, "Webhook for unknown gateway order");
            return Ok(WebhookOutcome::Ignored);
        };

        if let Some(payment) = &event.payload.payment {
            let expected = order.total_money().map_err(|e| {
                CheckoutError::Repository(RepositoryError::DataCorruption(e))
            })?;
            let expected = expected.to_minor_units()?;
            if payment.entity.amount != expected {
                return Err(CheckoutError::AmountMismatch {
                    expected,
                    paid: payment.entity.amount,
                });
            }
        }

        let outcome = self.settle(order.id, razorpay_payment_id).await?;
        Ok(WebhookOutcome::Settled(outcome))
    }
}

/// Price cart lines with the shared pricing function.
///
/// # Errors
///
/// Returns `CheckoutError::Pricing` for invalid lines.
pub fn price_lines(
    lines: &[CartLine],
    currency: CurrencyCode,
) -> Result<CheckoutSummary, CheckoutError> {
    let mut prices = Vec::with_capacity(lines.len());
    let mut summary_lines = Vec::with_capacity(lines.len());

    for line in lines {
        let price = line.price()?;
        let mut priced = summary_line(line.product_id, &line.title, &price)?;
        priced.item_id = Some(line.id);
        priced.in_stock = line.in_stock();
        summary_lines.push(priced);
        prices.push(price);
    }

    summarize(summary_lines, &prices, currency, false)
}

/// Price a placed order's items at their locked prices.
///
/// # Errors
///
/// Returns `CheckoutError::Pricing` for an invalid stored line.
pub fn price_order_items(
    items: &[OrderItem],
    currency: CurrencyCode,
) -> Result<CheckoutSummary, CheckoutError> {
    let mut prices = Vec::with_capacity(items.len());
    let mut summary_lines = Vec::with_capacity(items.len());

    for item in items {
        let price = item.price()?;
        summary_lines.push(summary_line(item.product_id, &item.title, &price)?);
        prices.push(price);
    }

    summarize(summary_lines, &prices, currency, true)
}

fn summary_line(
    product_id: ProductId,
    title: &str,
    price: &LineItemPrice,
) -> Result<SummaryLine, CheckoutError> {
    let discounted = discounted_unit_price(price.unit_price, price.discount_percentage)?;

    Ok(SummaryLine {
        item_id: None,
        product_id,
        title: title.to_string(),
        quantity: i32::try_from(price.quantity).map_err(|_| PricingError::Overflow)?,
        unit_price: price.unit_price,
        discount_percentage: price.discount_percentage,
        discounted_price: round_for_display(discounted),
        line_total: round_for_display(line_total(price)?),
        in_stock: true,
    })
}

fn summarize(
    lines: Vec<SummaryLine>,
    prices: &[LineItemPrice],
    currency: CurrencyCode,
    locked: bool,
) -> Result<CheckoutSummary, CheckoutError> {
    let total = order_total(prices, currency)?;

    Ok(CheckoutSummary {
        lines,
        locked,
        total: total.amount(),
        currency,
        total_display: total.display(),
        amount: total.to_minor_units()?,
    })
}

fn round_for_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
