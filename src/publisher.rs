//! Publishes domain events to NATS.

use tracing::{debug, info, warn};

use crate::config::NatsSettings;
use crate::domain::events::DomainEvent;

#[derive(Clone)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
    subject_prefix: String,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>, subject_prefix: impl Into<String>) -> Self {
        Self { nats, subject_prefix: subject_prefix.into() }
    }

    /// Events are only logged.
    pub fn disabled() -> Self { Self::new(None, "storefront") }

    /// Connects when a URL is configured. An unreachable server is logged and
    /// the service runs without publishing.
    pub async fn connect(settings: &NatsSettings) -> Self {
        let nats = match settings.url.as_deref() {
            Some(url) => match async_nats::connect(url).await {
                Ok(client) => { info!(%url, "connected to NATS"); Some(client) }
                Err(e) => { warn!(%url, error = %e, "NATS unavailable, events will not be published"); None }
            },
            None => None,
        };
        Self::new(nats, settings.subject_prefix.clone())
    }

    pub fn subject(&self, event: &DomainEvent) -> String {
        format!("{}.{}", self.subject_prefix, event.name())
    }

    /// Never fails the caller; a lost event is logged.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = self.subject(&event);
            let Some(client) = &self.nats else {
                debug!(%subject, "event not published (NATS not configured)");
                continue;
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => { warn!(%subject, error = %e, "failed to serialize event"); continue; }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}
