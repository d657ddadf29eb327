use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use keystone_core::{AppError, AppResult, Environment, PlatformId, PlatformScope};
use keystone_domain::catalog::k360_definition;
use keystone_domain::{DomainEvent, ResourceRecord};
use serde_json::Map;
use tokio::sync::Mutex;

use super::EventBus;
use crate::resource_ports::{EventConsumer, EventPublisher};

#[derive(Default)]
struct RecordingConsumer {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl EventConsumer for RecordingConsumer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn consume(&self, event: &DomainEvent) -> AppResult<()> {
        self.seen.lock().await.push(event.event_name());
        Ok(())
    }
}

struct FailingConsumer;

#[async_trait]
impl EventConsumer for FailingConsumer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn consume(&self, _event: &DomainEvent) -> AppResult<()> {
        Err(AppError::Internal("audit store unavailable".to_owned()))
    }
}

struct PanickingConsumer;

#[async_trait]
impl EventConsumer for PanickingConsumer {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn consume(&self, _event: &DomainEvent) -> AppResult<()> {
        panic!("consumer bug");
    }
}

fn events() -> (DomainEvent, DomainEvent) {
    let definition = k360_definition().unwrap_or_else(|_| unreachable!());
    let scope = PlatformScope::new(
        PlatformId::new("1").unwrap_or_else(|_| unreachable!()),
        Environment::Live,
    );
    let now = Utc::now();
    let record = ResourceRecord::new("k360_a", now, now, Map::new())
        .unwrap_or_else(|_| unreachable!());

    (
        DomainEvent::updated(&definition, &scope, &record, &Map::new()),
        DomainEvent::deleted(&definition, &scope, &record),
    )
}

#[tokio::test]
async fn failing_consumer_does_not_block_later_events() {
    let recorder = Arc::new(RecordingConsumer::default());
    let bus = EventBus::builder()
        .subscribe("k360Updated", Arc::new(FailingConsumer))
        .subscribe("k360Updated", Arc::new(PanickingConsumer))
        .subscribe("k360Updated", recorder.clone())
        .subscribe("k360Deleted", recorder.clone())
        .start();
    let publisher = bus.publisher();
    let (updated, deleted) = events();

    assert!(publisher.publish(updated).await.is_ok());
    assert!(publisher.publish(deleted).await.is_ok());
    bus.shutdown().await;

    let mut seen = recorder.seen.lock().await.clone();
    seen.sort();
    assert_eq!(seen, vec!["k360Deleted", "k360Updated"]);
}

#[tokio::test]
async fn events_without_subscribers_are_dropped() {
    let recorder = Arc::new(RecordingConsumer::default());
    let bus = EventBus::builder()
        .subscribe("k360Created", recorder.clone())
        .start();
    let (updated, _) = events();

    assert!(bus.publisher().publish(updated).await.is_ok());
    bus.shutdown().await;

    assert!(recorder.seen.lock().await.is_empty());
}

#[tokio::test]
async fn publishing_after_shutdown_fails() {
    let bus = EventBus::builder().start();
    let publisher = bus.publisher();
    bus.shutdown().await;

    let (updated, _) = events();
    assert!(matches!(
        publisher.publish(updated).await,
        Err(AppError::Internal(_))
    ));
}
