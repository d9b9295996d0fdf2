//! Storefront order service.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_orders::api::{self, AppState, TokenVerifier};
use storefront_orders::config::Settings;
use storefront_orders::gateway::{RazorpayClient, StripeClient};
use storefront_orders::publisher::EventPublisher;
use storefront_orders::services::{CartService, Checkout, PaymentWebhooks};
use storefront_orders::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().context("loading configuration")?;

    let store: Arc<dyn Store> = match settings.database.url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(settings.database.max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("no database configured, keeping everything in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let events = EventPublisher::connect(&settings.nats).await;
    let checkout = Checkout::new(
        store.clone(),
        Arc::new(StripeClient::new(&settings.stripe)?),
        Arc::new(RazorpayClient::new(&settings.razorpay)?),
        events,
    );
    let state = AppState {
        store: store.clone(),
        webhooks: PaymentWebhooks::new(checkout.clone(), &settings.stripe, &settings.razorpay),
        carts: CartService::new(store, settings.currency.clone()),
        checkout,
        tokens: Arc::new(TokenVerifier::new(&settings.auth.jwt_secret)),
    };

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    tracing::info!("storefront orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, api::router(state)).await?;
    Ok(())
}
