//! Redis pub/sub publisher for resource events.

use async_trait::async_trait;
use keystone_application::EventPublisher;
use keystone_core::{AppError, AppResult};
use keystone_domain::DomainEvent;
use redis::AsyncCommands;

/// Channel a named event is published on.
pub(crate) fn event_channel(channel_prefix: &str, event_name: &str) -> String {
    format!("{channel_prefix}:{event_name}")
}

/// Publishes JSON-encoded domain events on `{prefix}:{eventName}`.
#[derive(Clone)]
pub struct RedisEventPublisher {
    client: redis::Client,
    channel_prefix: String,
}

impl RedisEventPublisher {
    /// Creates a publisher with a configured Redis client and channel prefix.
    #[must_use]
    pub fn new(client: redis::Client, channel_prefix: impl Into<String>) -> Self {
        Self {
            client,
            channel_prefix: channel_prefix.into(),
        }
    }

    /// Returns the channel and JSON payload an event is sent as.
    fn encode(&self, event: &DomainEvent) -> AppResult<(String, String)> {
        let channel = event_channel(self.channel_prefix.as_str(), event.event_name().as_str());
        let payload = serde_json::to_string(event).map_err(|error| {
            AppError::Internal(format!("failed to encode event for '{channel}': {error}"))
        })?;

        Ok((channel, payload))
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: DomainEvent) -> AppResult<()> {
        let (channel, payload) = self.encode(&event)?;

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let _receivers: i64 = connection.publish(&channel, payload).await.map_err(|error| {
            AppError::Internal(format!("failed to publish event on '{channel}': {error}"))
        })?;

        Ok(())
    }
}
