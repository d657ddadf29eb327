//! Redis pub/sub subscriber forwarding resource events into a local bus.

use std::future::Future;

use futures::StreamExt;
use keystone_application::EventPublisher;
use keystone_core::{AppError, AppResult};
use keystone_domain::DomainEvent;
use tracing::{info, warn};

use crate::redis_event_publisher::event_channel;

/// Pattern-subscribes to `{prefix}:*` and re-publishes decoded events locally.
#[derive(Clone)]
pub struct RedisEventSubscriber {
    client: redis::Client,
    channel_prefix: String,
}

impl RedisEventSubscriber {
    /// Creates a subscriber with a configured Redis client and channel prefix.
    #[must_use]
    pub fn new(client: redis::Client, channel_prefix: impl Into<String>) -> Self {
        Self {
            client,
            channel_prefix: channel_prefix.into(),
        }
    }

    /// Forwards events until `shutdown` resolves.
    ///
    /// Returns an error when the subscription cannot be set up or the
    /// connection drops.
    pub async fn run<F>(&self, target: &dyn EventPublisher, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let pattern = format!("{}:*", self.channel_prefix);
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|error| {
            AppError::Internal(format!("failed to open redis subscription: {error}"))
        })?;
        pubsub.psubscribe(&pattern).await.map_err(|error| {
            AppError::Internal(format!("failed to subscribe to '{pattern}': {error}"))
        })?;
        info!(pattern = %pattern, "subscribed to resource events");

        let mut messages = pubsub.on_message();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => return Ok(()),
                message = messages.next() => {
                    let Some(message) = message else {
                        return Err(AppError::Internal(format!(
                            "redis subscription to '{pattern}' closed"
                        )));
                    };
                    self.forward(&message, target).await;
                }
            }
        }
    }

    async fn forward(&self, message: &redis::Msg, target: &dyn EventPublisher) {
        let decoded = message
            .get_channel::<String>()
            .and_then(|channel| {
                message
                    .get_payload::<String>()
                    .map(|payload| (channel, payload))
            })
            .map_err(|error| AppError::Internal(format!("unreadable redis message: {error}")))
            .and_then(|(channel, payload)| self.decode(channel.as_str(), payload.as_str()));

        let event = match decoded {
            Ok(event) => event,
            Err(error) => {
                warn!(error = %error, "skipping malformed resource event");
                return;
            }
        };

        let event_name = event.event_name();
        let resource_id = event.object_id.clone();
        if let Err(error) = target.publish(event).await {
            warn!(
                event_name = %event_name,
                resource_id = %resource_id,
                error = %error,
                "failed to forward resource event"
            );
        }
    }

    pub(crate) fn decode(&self, channel: &str, payload: &str) -> AppResult<DomainEvent> {
        let event: DomainEvent = serde_json::from_str(payload).map_err(|error| {
            AppError::Validation(format!("invalid event payload on '{channel}': {error}"))
        })?;

        let expected = event_channel(self.channel_prefix.as_str(), event.event_name().as_str());
        if channel != expected {
            return Err(AppError::Validation(format!(
                "event '{}' arrived on '{channel}' instead of '{expected}'",
                event.event_name()
            )));
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use keystone_core::{Environment, PlatformId, PlatformScope};
    use keystone_domain::catalog::k360_definition;
    use keystone_domain::{DomainEvent, ResourceRecord};
    use serde_json::Map;

    use super::RedisEventSubscriber;

    fn subscriber() -> RedisEventSubscriber {
        let client = redis::Client::open("redis://127.0.0.1:6379")
            .unwrap_or_else(|_| unreachable!());
        RedisEventSubscriber::new(client, "keystone:events")
    }

    fn encoded_event() -> (DomainEvent, String) {
        let definition = k360_definition().unwrap_or_else(|_| unreachable!());
        let scope = PlatformScope::new(
            PlatformId::new("1").unwrap_or_else(|_| unreachable!()),
            Environment::Live,
        );
        let now = Utc::now();
        let record = ResourceRecord::new("k360_a", now, now, Map::new())
            .unwrap_or_else(|_| unreachable!());
        let event = DomainEvent::created(&definition, &scope, &record);
        let payload = serde_json::to_string(&event).unwrap_or_default();
        (event, payload)
    }

    #[test]
    fn decodes_events_on_their_own_channel() {
        let (event, payload) = encoded_event();
        let decoded = subscriber().decode("keystone:events:k360Created", &payload);
        assert_eq!(decoded.ok(), Some(event));
    }

    #[test]
    fn rejects_mismatched_channels_and_garbage() {
        let (_, payload) = encoded_event();
        assert!(
            subscriber()
                .decode("keystone:events:k360Deleted", &payload)
                .is_err()
        );
        assert!(
            subscriber()
                .decode("keystone:events:k360Created", "{not json")
                .is_err()
        );
    }
}
