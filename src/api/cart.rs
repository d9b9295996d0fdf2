use axum::extract::State;
use axum::{routing::{get, post, put}, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{Json, Path};
use super::{AppState, AuthUser};
use crate::services::{CartMutation, CartView};
use crate::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest { pub product_id: Uuid }

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest { pub quantity: i64 }

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(view_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:product_id", put(set_quantity).delete(remove_item))
}

async fn view_cart(State(s): State<AppState>, user: AuthUser) -> Result<Json<CartView>> {
    Ok(Json(s.carts.view(user.user_id).await?))
}

async fn add_item(State(s): State<AppState>, user: AuthUser, Json(r): Json<AddItemRequest>) -> Result<Json<CartMutation>> {
    Ok(Json(s.carts.add_item(user.user_id, r.product_id).await?))
}

async fn set_quantity(
    State(s): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(r): Json<SetQuantityRequest>,
) -> Result<Json<CartMutation>> {
    Ok(Json(s.carts.set_quantity(user.user_id, product_id, r.quantity).await?))
}

async fn remove_item(State(s): State<AppState>, user: AuthUser, Path(product_id): Path<Uuid>) -> Result<Json<CartMutation>> {
    Ok(Json(s.carts.remove_item(user.user_id, product_id).await?))
}

async fn clear_cart(State(s): State<AppState>, user: AuthUser) -> Result<Json<CartView>> {
    Ok(Json(s.carts.clear(user.user_id).await?))
}
