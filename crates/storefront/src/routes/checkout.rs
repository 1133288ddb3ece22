//! Checkout flow handlers.
//!
//! The [`CheckoutFlow`] lives in the session under
//! [`session_keys::CHECKOUT_FLOW`]. Every handler loads it, reconciles it with
//! the user's current addresses and cart, applies one transition, and writes
//! it back only when something changed.

use std::collections::BTreeSet;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{
    AddressId, CartItemId, CheckoutFlow, CheckoutStep, OrderId, OrderStatus, TransitionError,
    UserId,
};

use crate::db::{AddressRepository, CartRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{Address, CartLine, session_keys};
use crate::razorpay::CheckoutOptions;
use crate::services::checkout::{CheckoutError, CheckoutService, CheckoutSummary, price_lines};
use crate::state::AppState;

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the checkout flow from the session, starting a new one if absent.
pub async fn load_flow(session: &Session) -> Result<CheckoutFlow> {
    Ok(session
        .get::<CheckoutFlow>(session_keys::CHECKOUT_FLOW)
        .await?
        .unwrap_or_default())
}

/// Store the checkout flow in the session.
pub async fn save_flow(session: &Session, flow: &CheckoutFlow) -> Result<()> {
    session.insert(session_keys::CHECKOUT_FLOW, flow).await?;
    Ok(())
}

/// The flow plus the data it refers to, reconciled.
struct CheckoutContext {
    user: UserId,
    flow: CheckoutFlow,
    addresses: Vec<Address>,
    cart: Vec<CartLine>,
}

impl CheckoutContext {
    /// Load the flow and drop selections that no longer exist. A user with
    /// no address selected gets their default one.
    async fn load(state: &AppState, user: UserId, session: &Session) -> Result<Self> {
        let mut flow = load_flow(session).await?;
        let before = flow.clone();

        let addresses = AddressRepository::new(state.pool()).list(user).await?;
        let cart = CartRepository::new(state.pool()).list(user).await?;

        match flow.selected_address() {
            Some(selected) if !addresses.iter().any(|a| a.id == selected) => flow.clear_address(),
            Some(_) => {}
            None => {
                if let Some(default) = addresses.iter().find(|a| a.is_default) {
                    flow.select_address(default.id);
                }
            }
        }

        let in_cart: BTreeSet<CartItemId> = cart.iter().map(|line| line.id).collect();
        flow.retain_items(&in_cart);

        if flow != before {
            save_flow(session, &flow).await?;
        }

        Ok(Self {
            user,
            flow,
            addresses,
            cart,
        })
    }

    fn has_address(&self, id: AddressId) -> bool {
        self.addresses.iter().any(|a| a.id == id)
    }

    fn has_item(&self, id: CartItemId) -> bool {
        self.cart.iter().any(|line| line.id == id)
    }

    fn selected_lines(&self) -> Vec<CartLine> {
        self.cart
            .iter()
            .filter(|line| self.flow.selected_items().contains(&line.id))
            .cloned()
            .collect()
    }

    /// Once an order is placed its locked items are what gets charged, so
    /// they are what gets shown.
    async fn summary(&self, state: &AppState) -> Result<CheckoutSummary> {
        if let Some(order_id) = self.flow.order_id() {
            let locked = CheckoutService::from_state(state)
                .locked_summary(self.user, order_id)
                .await?;
            if let Some(summary) = locked {
                return Ok(summary);
            }
        }
        Ok(price_lines(&self.selected_lines(), state.config().checkout.currency)?)
    }

    async fn view(self, state: &AppState) -> Result<CheckoutStateView> {
        let summary = self.summary(state).await?;

        Ok(CheckoutStateView {
            step: self.flow.step(),
            step_label: self.flow.step().label(),
            selected_address_id: self.flow.selected_address(),
            selected_item_ids: self.flow.selected_items().iter().copied().collect(),
            order_id: self.flow.order_id(),
            addresses: self.addresses,
            cart: self.cart,
            summary,
        })
    }
}

// =============================================================================
// Views
// =============================================================================

/// JSON view of the checkout, returned by every flow endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStateView {
    pub step: CheckoutStep,
    pub step_label: &'static str,
    pub selected_address_id: Option<AddressId>,
    pub selected_item_ids: Vec<CartItemId>,
    pub order_id: Option<OrderId>,
    pub addresses: Vec<Address>,
    pub cart: Vec<CartLine>,
    /// Priced view of the selected lines only.
    pub summary: CheckoutSummary,
}

fn state_response(view: CheckoutStateView) -> Json<Value> {
    Json(json!({ "success": true, "checkout": view }))
}

// =============================================================================
// Request Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectAddress {
    pub address_id: AddressId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectItems {
    pub item_ids: Vec<CartItemId>,
}

#[derive(Debug, Deserialize)]
pub struct GoBack {
    pub step: CheckoutStep,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRef {
    pub order_id: OrderId,
}

// =============================================================================
// Flow API
// =============================================================================

/// Current step, selection and priced summary.
pub async fn state(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>> {
    let ctx = CheckoutContext::load(&state, user.id, &session).await?;
    Ok(state_response(ctx.view(&state).await?))
}

/// Select the shipping address.
#[instrument(skip(state, user, session), fields(user_id = %user.id))]
pub async fn select_address(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SelectAddress>,
) -> Result<Json<Value>> {
    let mut ctx = CheckoutContext::load(&state, user.id, &session).await?;
    if !ctx.has_address(body.address_id) {
        return Err(CheckoutError::AddressNotFound.into());
    }

    ctx.flow.select_address(body.address_id);
    save_flow(&session, &ctx.flow).await?;
    Ok(state_response(ctx.view(&state).await?))
}

/// Replace the item selection.
#[instrument(skip(state, user, session), fields(user_id = %user.id))]
pub async fn select_items(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<SelectItems>,
) -> Result<Json<Value>> {
    let mut ctx = CheckoutContext::load(&state, user.id, &session).await?;
    if !body.item_ids.iter().all(|id| ctx.has_item(*id)) {
        return Err(CheckoutError::ItemsUnavailable.into());
    }

    ctx.flow.set_items(body.item_ids);
    save_flow(&session, &ctx.flow).await?;
    Ok(state_response(ctx.view(&state).await?))
}

/// Toggle one cart line in or out of the selection.
#[instrument(skip(state, user, session), fields(user_id = %user.id))]
pub async fn toggle_item(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CartItemId>,
) -> Result<Json<Value>> {
    let mut ctx = CheckoutContext::load(&state, user.id, &session).await?;
    if !ctx.has_item(id) {
        return Err(CheckoutError::ItemsUnavailable.into());
    }

    ctx.flow.toggle_item(id);
    save_flow(&session, &ctx.flow).await?;
    Ok(state_response(ctx.view(&state).await?))
}

/// Advance one step. Review → Payment places the order.
///
/// Calling this again at the payment step returns the same order.
#[instrument(skip(state, user, session), fields(user_id = %user.id))]
pub async fn next(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>> {
    let mut ctx = CheckoutContext::load(&state, user.id, &session).await?;

    match ctx.flow.step() {
        CheckoutStep::Address => {
            ctx.flow.advance()?;
        }
        CheckoutStep::Review => {
            let order = CheckoutService::from_state(&state)
                .place_order(user.id, &mut ctx.flow)
                .await?;
            let order_id = order.id.to_string();
            add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
        }
        CheckoutStep::Payment => {
            if ctx.flow.order_id().is_none() {
                return Err(TransitionError::OrderRequired.into());
            }
        }
    }

    save_flow(&session, &ctx.flow).await?;
    Ok(state_response(ctx.view(&state).await?))
}

/// Return to an earlier step. An existing order is left as is.
#[instrument(skip(state, user, session), fields(user_id = %user.id))]
pub async fn back(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<GoBack>,
) -> Result<Json<Value>> {
    let mut ctx = CheckoutContext::load(&state, user.id, &session).await?;
    ctx.flow.back_to(body.step)?;
    save_flow(&session, &ctx.flow).await?;
    Ok(state_response(ctx.view(&state).await?))
}

/// What the browser needs to open the payment modal for an order.
///
/// Creates the Razorpay order on first call and reuses it afterwards, so
/// "Pay Now" after a dismissed modal resumes the same payment.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn payment_details(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<OrderRef>,
) -> Result<Json<Value>> {
    let details = CheckoutService::from_state(&state)
        .payment_details(user.id, body.order_id)
        .await?;

    Ok(Json(json!({ "success": true, "order": details })))
}

// =============================================================================
// Page
// =============================================================================

/// An address option on the checkout page.
pub struct AddressOption {
    pub address: Address,
    pub selected: bool,
}

/// A cart line on the checkout page.
pub struct LineOption {
    pub line: CartLine,
    pub selected: bool,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub store_name: String,
    /// Public Razorpay key, for opening the modal when `options` is absent.
    pub razorpay_key: String,
    pub step: u8,
    pub step_label: &'static str,
    pub addresses: Vec<AddressOption>,
    pub lines: Vec<LineOption>,
    pub summary: CheckoutSummary,
    pub order_id: Option<OrderId>,
    /// Set at the payment step; rendered as JSON for `checkout.js`.
    pub options: Option<CheckoutOptions>,
    pub notice: Option<String>,
}

const GATEWAY_UNAVAILABLE_NOTICE: &str =
    "We couldn't reach the payment provider just now. Press Pay Now to try again.";

const EXPIRED_ORDER_NOTICE: &str =
    "Your previous order expired before it was paid. Review your items and continue to payment again.";

/// Display the checkout page for the current step.
#[instrument(skip(state, user, session), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<Response> {
    let mut ctx = CheckoutContext::load(&state, user.id, &session).await?;
    let mut options = None;
    let mut notice = None;

    if let (CheckoutStep::Payment, Some(order_id)) = (ctx.flow.step(), ctx.flow.order_id()) {
        let service = CheckoutService::from_state(&state);
        match service.payment_details(user.id, order_id).await {
            Ok(details) => {
                options = Some(details.checkout_options(
                    state.razorpay().key_id(),
                    &state.config().store_name,
                ));
            }
            Err(CheckoutError::OrderNotPayable(OrderStatus::Paid)) => {
                ctx.flow.reset();
                save_flow(&session, &ctx.flow).await?;
                let confirmation = format!("/orders/{order_id}/confirmation");
                return Ok(Redirect::to(&confirmation).into_response());
            }
            Err(
                CheckoutError::OrderNotPayable(OrderStatus::Cancelled)
                | CheckoutError::OrderNotFound,
            ) => {
                ctx.flow.renew_attempt();
                save_flow(&session, &ctx.flow).await?;
                notice = Some(EXPIRED_ORDER_NOTICE.to_string());
            }
            Err(CheckoutError::Gateway(e)) => {
                // Pay Now asks the server again, so the page stays usable
                tracing::warn!(%order_id, error = %e, "Payment gateway unavailable, rendering without options");
                notice = Some(GATEWAY_UNAVAILABLE_NOTICE.to_string());
            }
            Err(e) => return Err(AppError::from(e)),
        }
    }

    let summary = ctx.summary(&state).await?;
    let selected_address = ctx.flow.selected_address();
    let selected_items = ctx.flow.selected_items().clone();

    let template = CheckoutTemplate {
        store_name: state.config().store_name.clone(),
        razorpay_key: state.razorpay().key_id().to_string(),
        step: ctx.flow.step().number(),
        step_label: ctx.flow.step().label(),
        addresses: ctx
            .addresses
            .into_iter()
            .map(|address| AddressOption {
                selected: Some(address.id) == selected_address,
                address,
            })
            .collect(),
        lines: ctx
            .cart
            .into_iter()
            .map(|line| LineOption {
                selected: selected_items.contains(&line.id),
                line,
            })
            .collect(),
        summary,
        order_id: ctx.flow.order_id(),
        options,
        notice,
    };

    Ok(template.into_response())
}
