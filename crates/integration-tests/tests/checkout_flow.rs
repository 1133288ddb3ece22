//! End-to-end checkout flow against a real database and a mocked gateway.
//!
//! Run with `cargo test -p bazaar-integration-tests -- --ignored` and
//! `TEST_DATABASE_URL` pointing at a disposable database.

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use bazaar_core::{OrderId, OrderStatus, ProductId, UserId};
use bazaar_integration_tests::{TestContext, json_body, sign_webhook, signed_success};
use bazaar_storefront::db::{CartRepository, OrderRepository};
use bazaar_storefront::error::PAYMENT_VERIFICATION_FAILED;
use bazaar_storefront::models::{MAX_LINE_QUANTITY, Order, Product};

/// A buyer parked at the payment step with a gateway order attached.
struct AtPayment {
    user: UserId,
    client: Client,
    product: ProductId,
    order_id: i32,
    razorpay_order_id: String,
    amount: i64,
}

async fn post(client: &Client, url: String, body: Value) -> (StatusCode, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

async fn add_address(ctx: &TestContext, client: &Client) {
    let (status, _) = post(
        client,
        ctx.url("/api/addresses"),
        json!({
            "name": "Asha Rao",
            "line1": "12 MG Road",
            "city": "Bengaluru",
            "state": "Karnataka",
            "postalCode": "560001",
            "country": "IN",
            "phone": "+91 98765 43210",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

/// Add a product to the cart and select every cart line for checkout.
async fn fill_cart(ctx: &TestContext, client: &Client, product: ProductId, quantity: u32) {
    let (status, cart) = post(
        client,
        ctx.url("/api/cart"),
        json!({ "productId": product, "quantity": quantity }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let item_ids: Vec<Value> = cart["cart"]["lines"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| line["itemId"].clone())
        .collect();
    let (status, _) = post(
        client,
        ctx.url("/api/checkout/items"),
        json!({ "itemIds": item_ids }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

async fn next(ctx: &TestContext, client: &Client) -> (StatusCode, Value) {
    post(client, ctx.url("/api/checkout/next"), json!({})).await
}

async fn payment_details(ctx: &TestContext, client: &Client, order_id: i32) -> (StatusCode, Value) {
    post(
        client,
        ctx.url("/api/checkout"),
        json!({ "orderId": order_id }),
    )
    .await
}

/// Drive a new buyer through Address and Review so the order is placed,
/// without asking the gateway for anything yet.
async fn place_order(
    ctx: &TestContext,
    price: Decimal,
    discount: Decimal,
    quantity: u32,
) -> (UserId, Client, Product, i32) {
    let product = ctx.create_product(price, discount, 10).await;
    let (user, client) = ctx.login_new_user().await;

    add_address(ctx, &client).await;
    fill_cart(ctx, &client, product.id, quantity).await;

    let (status, review) = next(ctx, &client).await;
    assert_eq!(status, StatusCode::OK, "{review}");
    assert_eq!(review["checkout"]["step"], 2);

    let (status, payment) = next(ctx, &client).await;
    assert_eq!(status, StatusCode::OK, "{payment}");
    assert_eq!(payment["checkout"]["step"], 3);
    let order_id = i32::try_from(payment["checkout"]["orderId"].as_i64().unwrap()).unwrap();

    (user, client, product, order_id)
}

async fn to_payment(ctx: &TestContext, price: Decimal, discount: Decimal, quantity: u32) -> AtPayment {
    let (user, client, product, order_id) = place_order(ctx, price, discount, quantity).await;

    let (status, details) = payment_details(ctx, &client, order_id).await;
    assert_eq!(status, StatusCode::OK, "{details}");

    AtPayment {
        user,
        client,
        product: product.id,
        order_id,
        razorpay_order_id: details["order"]["razorpayOrderId"]
            .as_str()
            .unwrap()
            .to_string(),
        amount: details["order"]["amount"].as_i64().unwrap(),
    }
}

async fn checkout_state(ctx: &TestContext, client: &Client) -> Value {
    client
        .get(ctx.url("/api/checkout/state"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn checkout_page(ctx: &TestContext, client: &Client) -> (StatusCode, String, String) {
    let response = client.get(ctx.url("/checkout")).send().await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    (status, content_type, response.text().await.unwrap())
}

async fn order(ctx: &TestContext, id: i32) -> Order {
    OrderRepository::new(&ctx.pool)
        .get(OrderId::new(id))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_happy_path_charges_locked_total_and_settles() {
    let ctx = TestContext::start().await;
    let buyer = to_payment(&ctx, dec!(500), dec!(10), 2).await;

    assert_eq!(buyer.amount, 90000);
    assert_eq!(order(&ctx, buyer.order_id).await.total, dec!(900.00));

    let (status, body) = post(
        &buyer.client,
        ctx.url("/api/payment/success"),
        signed_success(buyer.order_id, &buyer.razorpay_order_id, "pay_happy"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["redirect"],
        format!("/orders/{}/confirmation", buyer.order_id)
    );

    let paid = order(&ctx, buyer.order_id).await;
    assert_eq!(paid.status, OrderStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert_eq!(ctx.stock(buyer.product).await, 8);
    assert!(CartRepository::new(&ctx.pool)
        .list(buyer.user)
        .await
        .unwrap()
        .is_empty());

    // The flow was reset for the next checkout
    let state: Value = buyer
        .client
        .get(ctx.url("/api/checkout/state"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["checkout"]["step"], 1);
    assert!(state["checkout"]["orderId"].is_null());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_duplicate_confirmation_is_idempotent() {
    let ctx = TestContext::start().await;
    let buyer = to_payment(&ctx, dec!(120), dec!(0), 3).await;
    let confirmation = signed_success(buyer.order_id, &buyer.razorpay_order_id, "pay_twice");

    for _ in 0..2 {
        let (status, _) = post(
            &buyer.client,
            ctx.url("/api/payment/success"),
            confirmation.clone(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(order(&ctx, buyer.order_id).await.status, OrderStatus::Paid);
    assert_eq!(ctx.stock(buyer.product).await, 7);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_tampered_signature_leaves_order_pending() {
    let ctx = TestContext::start().await;
    let buyer = to_payment(&ctx, dec!(250), dec!(0), 1).await;

    let mut confirmation = signed_success(buyer.order_id, &buyer.razorpay_order_id, "pay_real");
    confirmation["paymentIntentId"] = json!("pay_forged");

    let (status, body) = post(&buyer.client, ctx.url("/api/payment/success"), confirmation).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], PAYMENT_VERIFICATION_FAILED);

    assert_eq!(order(&ctx, buyer.order_id).await.status, OrderStatus::Pending);
    assert_eq!(ctx.stock(buyer.product).await, 10);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_dismissed_modal_resumes_same_gateway_order() {
    let ctx = TestContext::start().await;
    let buyer = to_payment(&ctx, dec!(75), dec!(0), 2).await;
    let created = ctx.gateway_orders_created().await;

    let (status, body) = post(
        &buyer.client,
        ctx.url("/api/payment/cancel"),
        json!({ "orderId": buyer.order_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");

    let dismissed = order(&ctx, buyer.order_id).await;
    assert_eq!(dismissed.status, OrderStatus::Pending);
    assert!(dismissed.abandoned_at.is_some());

    // "Pay Now" and a repeated `next` both land on the same order
    let (_, again) = payment_details(&ctx, &buyer.client, buyer.order_id).await;
    assert_eq!(again["order"]["razorpayOrderId"], buyer.razorpay_order_id.as_str());
    let (_, state) = next(&ctx, &buyer.client).await;
    assert_eq!(state["checkout"]["orderId"], buyer.order_id);

    assert_eq!(ctx.gateway_orders_created().await, created);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_price_change_after_order_does_not_change_charge() {
    let ctx = TestContext::start().await;
    let (_, client, product, order_id) = place_order(&ctx, dec!(400), dec!(25), 1).await;

    ctx.reprice(&product, dec!(999)).await;

    let (status, details) = payment_details(&ctx, &client, order_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["order"]["amount"], 30000);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_payment_step_shows_the_locked_total() {
    let ctx = TestContext::start().await;
    let (_, client, product, order_id) = place_order(&ctx, dec!(400), dec!(25), 1).await;

    ctx.reprice(&product, dec!(999)).await;

    let (_, details) = payment_details(&ctx, &client, order_id).await;
    let charged = details["order"]["amount"].as_i64().unwrap();
    assert_eq!(charged, 30000);

    let state = checkout_state(&ctx, &client).await;
    assert_eq!(state["checkout"]["step"], 3);
    assert_eq!(state["checkout"]["summary"]["amount"], charged);
    assert_eq!(state["checkout"]["summary"]["totalDisplay"], "₹300.00");
    assert_eq!(state["checkout"]["summary"]["locked"], true);

    let (status, _, page) = checkout_page(&ctx, &client).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("₹300.00"));
    assert!(!page.contains("₹749.25"));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_gateway_outage_renders_page_and_pay_now_recovers() {
    let ctx = TestContext::start().await;
    let (_, client, _, order_id) = place_order(&ctx, dec!(500), dec!(10), 2).await;

    ctx.gateway_down().await;

    let (status, content_type, page) = checkout_page(&ctx, &client).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/html"), "{content_type}");
    assert!(page.contains("Press Pay Now to try again"));
    assert!(page.contains(r#"data-action="pay""#));
    assert!(!page.contains("razorpay-options"));

    let (status, _) = payment_details(&ctx, &client, order_id).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(order(&ctx, order_id).await.status, OrderStatus::Pending);

    ctx.gateway_up().await;

    let (status, details) = payment_details(&ctx, &client, order_id).await;
    assert_eq!(status, StatusCode::OK, "{details}");
    assert_eq!(details["order"]["amount"], 90000);

    let (status, _, page) = checkout_page(&ctx, &client).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("razorpay-options"));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_repeated_adds_stop_at_line_limit() {
    let ctx = TestContext::start().await;
    let product = ctx.create_product(dec!(10), dec!(0), 500).await;
    let (user, client) = ctx.login_new_user().await;

    for _ in 0..3 {
        let (status, _) = post(
            &client,
            ctx.url("/api/cart"),
            json!({ "productId": product.id, "quantity": 60 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let lines = CartRepository::new(&ctx.pool).list(user).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, MAX_LINE_QUANTITY);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_failed_guard_keeps_step() {
    let ctx = TestContext::start().await;
    let product = ctx.create_product(dec!(50), dec!(0), 5).await;
    let (_, client) = ctx.login_new_user().await;

    // Items but no address
    fill_cart(&ctx, &client, product.id, 1).await;
    let (status, body) = next(&ctx, &client).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("address"));

    let state: Value = client
        .get(ctx.url("/api/checkout/state"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["checkout"]["step"], 1);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_webhook_settles_order() {
    let ctx = TestContext::start().await;
    let buyer = to_payment(&ctx, dec!(500), dec!(10), 2).await;

    let body = serde_json::to_vec(&json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_webhook",
                    "order_id": buyer.razorpay_order_id,
                    "amount": buyer.amount,
                    "currency": "INR",
                    "status": "captured",
                }
            }
        }
    }))
    .unwrap();

    let response = ctx
        .client()
        .post(ctx.url("/api/payment/webhook"))
        .header("x-razorpay-signature", sign_webhook(&body))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "completed");

    assert_eq!(order(&ctx, buyer.order_id).await.status, OrderStatus::Paid);
    assert_eq!(ctx.stock(buyer.product).await, 8);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_payment_after_expiry_is_rejected() {
    let ctx = TestContext::start().await;
    let buyer = to_payment(&ctx, dec!(300), dec!(0), 1).await;

    assert!(OrderRepository::new(&ctx.pool)
        .cancel(OrderId::new(buyer.order_id))
        .await
        .unwrap());

    let (status, body) = post(
        &buyer.client,
        ctx.url("/api/payment/success"),
        signed_success(buyer.order_id, &buyer.razorpay_order_id, "pay_late"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], PAYMENT_VERIFICATION_FAILED);

    assert_eq!(order(&ctx, buyer.order_id).await.status, OrderStatus::Cancelled);
    assert_eq!(ctx.stock(buyer.product).await, 10);
}
