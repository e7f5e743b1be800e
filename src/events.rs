//! Fan-out of domain events to NATS, when a connection is configured.

use tracing::{debug, warn};

use crate::domain::DomainEvent;

#[derive(Clone, Default)]
pub enum EventPublisher {
    #[default]
    Disabled,
    Nats(async_nats::Client),
}

impl EventPublisher {
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::Disabled };
        match async_nats::connect(url).await {
            Ok(client) => Self::Nats(client),
            Err(e) => {
                warn!(error = %e, "NATS unavailable, domain events will not be published");
                Self::Disabled
            }
        }
    }

    /// Best effort: a failed publish is logged and never fails the caller.
    pub async fn publish(&self, event: &DomainEvent) {
        let Self::Nats(client) = self else {
            debug!(subject = event.subject(), "event publishing disabled");
            return;
        };
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, subject = event.subject(), "could not encode domain event");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            warn!(error = %e, subject = event.subject(), "failed to publish domain event");
        }
    }

    pub async fn publish_all(&self, events: &[DomainEvent]) {
        for event in events {
            self.publish(event).await;
        }
    }
}
