//! Provider callbacks. Handlers take the raw body so signatures are checked
//! over exactly the bytes the provider signed.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::{routing::post, Json, Router};
use serde_json::{json, Value};

use super::AppState;
use crate::{Result, StorefrontError};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/card", post(card_webhook))
        .route("/webhooks/regional", post(regional_webhook))
}

fn signature<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).ok_or(StorefrontError::InvalidSignature)
}

async fn card_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>> {
    s.webhooks.handle_card(signature(&headers, "stripe-signature")?, &body).await?;
    Ok(Json(json!({ "received": true })))
}

async fn regional_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Value>> {
    s.webhooks.handle_regional(signature(&headers, "x-razorpay-signature")?, &body).await?;
    Ok(Json(json!({ "status": "ok" })))
}
