use async_trait::async_trait;
use keystone_core::AppResult;
use keystone_domain::DomainEvent;

/// Port for handing completed-mutation events to subscribers.
///
/// Implementations enqueue and return; they never wait for consumers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Enqueues one event under its bus name.
    async fn publish(&self, event: DomainEvent) -> AppResult<()>;
}

/// Subscriber invoked for every event it is registered for.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Stable label used in logs.
    fn name(&self) -> &str;

    /// Handles one event.
    async fn consume(&self, event: &DomainEvent) -> AppResult<()>;
}
