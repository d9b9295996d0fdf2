//! HTTP surface.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod error;
pub mod extract;
pub mod orders;
pub mod products;
pub mod webhooks;

use axum::extract::FromRef;
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::{CartService, Checkout, PaymentWebhooks};
use crate::store::Store;
pub use auth::{AdminUser, AuthUser, Claims, Role, TokenVerifier};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub checkout: Checkout,
    pub carts: CartService,
    pub webhooks: PaymentWebhooks,
    pub tokens: Arc<TokenVerifier>,
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self { state.tokens.clone() }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-orders"})) }))
        .merge(products::routes())
        .merge(cart::routes())
        .merge(orders::routes())
        .merge(webhooks::routes())
        .merge(admin::routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
