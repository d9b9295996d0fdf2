use axum::extract::State;
use axum::{routing::get, Router};
use serde::Deserialize;

use super::extract::{Json, Query};
use super::AppState;
use crate::domain::aggregates::Product;
use crate::store::{Page, Paginated, ProductFilter};
use crate::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/products", get(list_products))
}

async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<Paginated<Product>>> {
    let filter = ProductFilter {
        category: p.category.filter(|c| !c.trim().is_empty()),
        search: p.search.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
    };
    let products = s.store.find_active_products(&filter, Page::new(p.page, p.per_page)).await?;
    Ok(Json(products))
}
