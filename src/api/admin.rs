use axum::extract::State;
use axum::{routing::{get, patch}, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{Json, Path, Query};
use super::{AdminUser, AppState};
use crate::domain::aggregates::{Order, OrderStatus};
use crate::store::{LedgerStats, Page, Paginated};
use crate::{Result, StorefrontError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest { pub order_status: String }

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/orders", get(list_orders))
        .route("/admin/orders/:id/status", patch(update_status))
        .route("/admin/stats", get(stats))
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse().map_err(|_| StorefrontError::Validation(format!("Unknown order status '{raw}'")))
}

async fn list_orders(State(s): State<AppState>, _admin: AdminUser, Query(p): Query<OrderListParams>) -> Result<Json<Paginated<Order>>> {
    let status = p.status.as_deref().filter(|v| !v.is_empty()).map(parse_status).transpose()?;
    Ok(Json(s.store.all_orders(status, Page::new(p.page, p.per_page)).await?))
}

async fn update_status(
    State(s): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let next = parse_status(&r.order_status)?;
    tracing::info!(admin_id = %admin.user_id, order_id = %id, status = %next, "admin status change");
    Ok(Json(s.checkout.update_status(id, next).await?))
}

async fn stats(State(s): State<AppState>, _admin: AdminUser) -> Result<Json<LedgerStats>> {
    Ok(Json(s.store.stats().await?))
}
