mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::*;
use storefront_orders::api::{self, Role};

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn send_raw(app: &Router, uri: &str, signature_header: (&str, String), body: String) -> StatusCode {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(signature_header.0, signature_header.1)
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

fn address_json() -> Value {
    json!({
        "street": "12 MG Road", "city": "Bengaluru", "state": "KA",
        "zipCode": "560001", "country": "IN", "phone": "+91 80 1234 5678"
    })
}

#[tokio::test]
async fn test_health() {
    let app = api::router(Harness::new().state());
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_product_listing_is_public_and_filtered() {
    let h = Harness::new();
    h.product("Desk Lamp", 250, 0).await;
    h.product("Floor Lamp", 900, 3).await;
    h.product("Mug", 100, 3).await;
    let app = api::router(h.state());

    let (status, body) = send(&app, Method::GET, "/products?search=lamp&perPage=1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["perPage"], 1);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cart_requires_token() {
    let app = api::router(Harness::new().state());
    let (status, body) = send(&app, Method::GET, "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&app, Method::GET, "/cart", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cart_and_cash_checkout_over_http() {
    let h = Harness::new();
    let lamp = h.product("Lamp", 250, 5).await;
    let app = api::router(h.state());
    let user = Uuid::new_v4();
    let token = token(user, Role::User);

    let (status, body) = send(&app, Method::POST, "/cart/items", Some(&token), Some(json!({ "productId": lamp.id() }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "added");

    let uri = format!("/cart/items/{}", lamp.id());
    let (_, body) = send(&app, Method::PUT, &uri, Some(&token), Some(json!({ "quantity": 9 }))).await;
    assert_eq!(body["status"], "quantityLimited");
    assert_eq!(body["cart"]["items"][0]["quantity"], 5);
    send(&app, Method::PUT, &uri, Some(&token), Some(json!({ "quantity": 2 }))).await;

    let order = json!({ "shippingAddress": address_json(), "paymentMethod": "cod" });
    let (status, body) = send(&app, Method::POST, "/orders/place-order", Some(&token), Some(order)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["orderStatus"], "processing");
    assert_eq!(body["paymentStatus"], "pending");
    assert_eq!(body["items"][0]["quantity"], 2);
    let order_id = body["id"].as_str().unwrap().to_string();

    let (_, cart) = send(&app, Method::GET, "/cart", Some(&token), None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    let (status, mine) = send(&app, Method::GET, "/orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["total"], 1);

    let other = token_for_stranger();
    let (status, _) = send(&app, Method::GET, &format!("/orders/{order_id}"), Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn token_for_stranger() -> String { token(Uuid::new_v4(), Role::User) }

#[tokio::test]
async fn test_checkout_error_responses() {
    let h = Harness::new();
    let mug = h.product("Mug", 100, 1).await;
    let app = api::router(h.state());
    let user = Uuid::new_v4();
    let token = token(user, Role::User);

    let order = json!({ "shippingAddress": address_json(), "paymentMethod": "cod" });
    let (status, body) = send(&app, Method::POST, "/orders/place-order", Some(&token), Some(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty_cart");

    h.fill_cart(user, &mug, 1).await;
    let order = json!({ "shippingAddress": address_json(), "paymentMethod": "bitcoin" });
    let (status, body) = send(&app, Method::POST, "/orders/place-order", Some(&token), Some(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_payment_method");

    let order = json!({ "shippingAddress": { "street": "x" }, "paymentMethod": "cod" });
    let (status, body) = send(&app, Method::POST, "/orders/place-order", Some(&token), Some(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn test_malformed_requests_get_error_body() {
    let h = Harness::new();
    let mug = h.product("Mug", 100, 1).await;
    let app = api::router(h.state());
    let user = Uuid::new_v4();
    let token = token(user, Role::User);
    h.fill_cart(user, &mug, 1).await;

    let order = json!({ "shippingAddress": address_json() });
    let (status, body) = send(&app, Method::POST, "/orders/place-order", Some(&token), Some(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
    assert!(body["message"].as_str().unwrap().contains("paymentMethod"));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/orders/place-order")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"paymentMethod\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "validation");

    let (status, body) = send(&app, Method::GET, "/orders/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, body) = send(&app, Method::GET, "/products?page=first", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    assert_eq!(h.stock_of(&mug).await, 1);
}

#[tokio::test]
async fn test_far_page_is_empty() {
    let h = Harness::new();
    h.product("Mug", 100, 1).await;
    let app = api::router(h.state());

    let (status, body) = send(&app, Method::GET, "/orders?page=4294967295", Some(&token(Uuid::new_v4(), Role::User)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 4_294_967_295u64);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, Method::GET, "/products?page=4294967295&perPage=100", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_card_checkout_response_shape() {
    let h = Harness::new();
    let mug = h.product("Mug", 10, 3).await;
    let user = Uuid::new_v4();
    h.fill_cart(user, &mug, 1).await;
    let app = api::router(h.state());

    let order = json!({ "shippingAddress": address_json(), "paymentMethod": "stripe" });
    let (status, body) = send(&app, Method::POST, "/orders/place-order", Some(&token(user, Role::User)), Some(order)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["clientSecret"], "pi_1_secret_abc");
    assert!(body["orderId"].is_string());
}

#[tokio::test]
async fn test_webhook_endpoints() {
    let h = Harness::new();
    let mug = h.product("Mug", 10, 3).await;
    let user = Uuid::new_v4();
    h.fill_cart(user, &mug, 1).await;
    let app = api::router(h.state());

    let order = json!({ "shippingAddress": address_json(), "paymentMethod": "razorpay" });
    let (_, placed) = send(&app, Method::POST, "/orders/place-order", Some(&token(user, Role::User)), Some(order)).await;
    assert_eq!(placed["gatewayOrderId"], "order_1");
    assert_eq!(placed["key"], "rzp_test_key");

    let event = razorpay_event("order.paid", "order_1", "pay_1");
    let status = send_raw(&app, "/webhooks/regional", ("x-razorpay-signature", "bad".into()), event.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.stock_of(&mug).await, 3);

    let status = send_raw(&app, "/webhooks/regional", ("x-razorpay-signature", razorpay_signature(&event)), event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.stock_of(&mug).await, 2);

    let unknown = stripe_succeeded("pi_unknown", None);
    let status = send_raw(&app, "/webhooks/card", ("stripe-signature", stripe_signature(&unknown)), unknown).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_surface() {
    let h = Harness::new();
    let mug = h.product("Mug", 100, 3).await;
    let user = Uuid::new_v4();
    h.fill_cart(user, &mug, 1).await;
    let app = api::router(h.state());
    let order = json!({ "shippingAddress": address_json(), "paymentMethod": "cod" });
    let (_, placed) = send(&app, Method::POST, "/orders/place-order", Some(&token(user, Role::User)), Some(order)).await;
    let order_id = placed["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, Method::GET, "/admin/orders", Some(&token(user, Role::User)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token(Uuid::new_v4(), Role::Admin);
    let uri = format!("/admin/orders/{order_id}/status");
    let (status, body) = send(&app, Method::PATCH, &uri, Some(&admin), Some(json!({ "orderStatus": "delivered" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_status_transition");

    let (status, body) = send(&app, Method::PATCH, &uri, Some(&admin), Some(json!({ "orderStatus": "shipped" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orderStatus"], "shipped");

    let (_, listed) = send(&app, Method::GET, "/admin/orders?status=processing", Some(&admin), None).await;
    assert_eq!(listed["total"], 0);
    let (_, listed) = send(&app, Method::GET, "/admin/orders?status=shipped", Some(&admin), None).await;
    assert_eq!(listed["total"], 1);

    let (status, stats) = send(&app, Method::GET, "/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalOrders"], 1);
    assert_eq!(stats["totalProducts"], 1);
}
