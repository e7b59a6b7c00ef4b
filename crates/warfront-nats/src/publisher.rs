//! [`EventPublisher`] that forwards domain events to NATS.
//!
//! Each event is published as JSON on `{prefix}.{event_type}`, for example
//! `warfront.war.declared` or `warfront.battle.score_updated`. Subscribers
//! can take everything with `{prefix}.>` or one family with
//! `{prefix}.battle.*`.

use tracing::{debug, info, warn};
use warfront_core::config::InfrastructureConfig;
use warfront_core::notify::EventPublisher;
use warfront_types::{Event, EventType};

use crate::error::NatsError;

/// Publishes domain events on NATS subjects derived from their type.
#[derive(Debug, Clone)]
pub struct NatsEventPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsEventPublisher {
    /// Connect to a NATS server and publish under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`NatsError::InvalidPrefix`] for a prefix that is not a
    /// plain dotted subject, or [`NatsError::Connect`] if the server cannot
    /// be reached.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, NatsError> {
        validate_prefix(prefix)?;
        info!(url = url, prefix = prefix, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| NatsError::Connect {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        info!("NATS connection established");
        Ok(Self::with_client(client, prefix))
    }

    /// Connect using the engine's infrastructure settings.
    ///
    /// # Errors
    ///
    /// See [`NatsEventPublisher::connect`].
    pub async fn from_config(config: &InfrastructureConfig) -> Result<Self, NatsError> {
        Self::connect(&config.nats_url, &config.event_subject_prefix).await
    }

    /// Wrap an existing client. The prefix is not validated.
    pub fn with_client(client: async_nats::Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_owned(),
        }
    }

    /// The subject events of `event_type` are published on.
    pub fn subject_for(&self, event_type: EventType) -> String {
        subject(&self.prefix, event_type)
    }

    /// Flush buffered messages to the server.
    ///
    /// # Errors
    ///
    /// Returns [`NatsError::Flush`] if the server cannot be reached.
    pub async fn flush(&self) -> Result<(), NatsError> {
        self.client
            .flush()
            .await
            .map_err(|e| NatsError::Flush(e.to_string()))
    }
}

impl EventPublisher for NatsEventPublisher {
    fn publish(&self, event: &Event) {
        let subject = self.subject_for(event.event_type);
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(subject = subject, error = %e, "failed to serialize event");
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(subject = subject, event_id = %event.id, "no async runtime, event dropped");
            return;
        };

        debug!(subject = subject, event_id = %event.id, "publishing event");
        let client = self.client.clone();
        runtime.spawn(async move {
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(subject = subject, error = %e, "failed to publish event");
            }
        });
    }
}

/// `{prefix}.{event_type}`.
pub fn subject(prefix: &str, event_type: EventType) -> String {
    format!("{prefix}.{}", event_type.as_str())
}

/// Check that `prefix` is a dotted NATS subject without wildcards.
///
/// # Errors
///
/// Returns [`NatsError::InvalidPrefix`] if it is empty, contains
/// whitespace or a wildcard, or has an empty token.
pub fn validate_prefix(prefix: &str) -> Result<(), NatsError> {
    let valid = !prefix.is_empty()
        && prefix.split('.').all(|token| {
            !token.is_empty()
                && !token
                    .chars()
                    .any(|c| c.is_whitespace() || c == '*' || c == '>')
        });
    if valid {
        Ok(())
    } else {
        Err(NatsError::InvalidPrefix(prefix.to_owned()))
    }
}
