use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::{get, post}, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{Json, Path, Query};
use super::{AppState, AuthUser};
use crate::domain::aggregates::Order;
use crate::services::{PlaceOrder, PlacedOrder, VerifyPayment};
use crate::store::{Page, Paginated};
use crate::{Result, StorefrontError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams { pub page: Option<u32>, pub per_page: Option<u32> }

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/place-order", post(place_order))
        .route("/orders/verify-payment", post(verify_payment))
}

async fn place_order(State(s): State<AppState>, user: AuthUser, Json(r): Json<PlaceOrder>) -> Result<(StatusCode, Json<PlacedOrder>)> {
    Ok((StatusCode::CREATED, Json(s.checkout.place_order(user.user_id, r).await?)))
}

async fn verify_payment(State(s): State<AppState>, user: AuthUser, Json(r): Json<VerifyPayment>) -> Result<Json<Order>> {
    Ok(Json(s.checkout.verify_payment(user.user_id, r).await?))
}

async fn list_orders(State(s): State<AppState>, user: AuthUser, Query(p): Query<PageParams>) -> Result<Json<Paginated<Order>>> {
    Ok(Json(s.store.orders_for_user(user.user_id, Page::new(p.page, p.per_page)).await?))
}

async fn get_order(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    let order = s.store.order(id).await?
        .filter(|o| o.user_id() == user.user_id)
        .ok_or_else(|| StorefrontError::NotFound(format!("Order {id}")))?;
    Ok(Json(order))
}
