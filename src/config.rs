//! Process configuration, loaded once at start-up and passed to whoever needs it.
//!
//! Values come from built-in defaults overlaid by `STOREFRONT__*` environment
//! variables, e.g. `STOREFRONT__AUTH__JWT_SECRET` or `STOREFRONT__STRIPE__SECRET_KEY`.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use thiserror::Error;
use validator::Validate;

pub const ENV_PREFIX: &str = "STOREFRONT";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[validate]
    pub server: ServerSettings,
    #[validate]
    pub database: DatabaseSettings,
    #[validate]
    pub auth: AuthSettings,
    #[validate]
    pub stripe: StripeSettings,
    pub razorpay: RazorpaySettings,
    pub nats: NatsSettings,
    /// Currency of an empty cart's subtotal; product prices carry their own.
    #[validate(length(equal = 3))]
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerSettings {
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatabaseSettings {
    /// Without a URL the service keeps everything in memory.
    pub url: Option<String>,
    #[validate(range(min = 1, max = 200))]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AuthSettings {
    #[validate(length(min = 32, message = "jwt_secret must be at least 32 characters"))]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    #[validate(range(min = 1))]
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpaySettings {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsSettings {
    pub url: Option<String>,
    pub subject_prefix: String,
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl Settings {
    /// Reads the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
    }

    pub fn from_env(env: Environment) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8083)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.jwt_secret", "")?
            .set_default("stripe.secret_key", "")?
            .set_default("stripe.webhook_secret", "")?
            .set_default("stripe.api_base", "https://api.stripe.com")?
            .set_default("stripe.webhook_tolerance_secs", 300)?
            .set_default("razorpay.key_id", "")?
            .set_default("razorpay.key_secret", "")?
            .set_default("razorpay.webhook_secret", "")?
            .set_default("razorpay.api_base", "https://api.razorpay.com")?
            .set_default("nats.subject_prefix", "storefront")?
            .set_default("currency", "INR")?
            .add_source(env)
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}
