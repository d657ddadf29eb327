#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use keystone_core::{AppError, AppResult};
use keystone_domain::DomainEvent;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error};

use crate::resource_ports::{EventConsumer, EventPublisher};

type SubscriptionTable = HashMap<String, Vec<Arc<dyn EventConsumer>>>;

/// Collects the fixed event-name to consumer table before the bus starts.
#[derive(Default)]
pub struct EventBusBuilder {
    subscriptions: SubscriptionTable,
}

impl EventBusBuilder {
    /// Registers a consumer for one event name. Registration order is kept.
    #[must_use]
    pub fn subscribe(
        mut self,
        event_name: impl Into<String>,
        consumer: Arc<dyn EventConsumer>,
    ) -> Self {
        self.subscriptions
            .entry(event_name.into())
            .or_default()
            .push(consumer);
        self
    }

    /// Registers a consumer for several event names.
    #[must_use]
    pub fn subscribe_all<I, S>(mut self, event_names: I, consumer: Arc<dyn EventConsumer>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for event_name in event_names {
            self = self.subscribe(event_name, Arc::clone(&consumer));
        }
        self
    }

    /// Spawns the dispatcher task and returns the running bus.
    #[must_use]
    pub fn start(self) -> EventBus {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (stop_sender, stop_receiver) = oneshot::channel();
        let dispatcher = tokio::spawn(run_dispatcher(
            receiver,
            Arc::new(self.subscriptions),
            stop_receiver,
        ));

        EventBus {
            sender,
            stop_sender,
            dispatcher,
        }
    }
}

/// In-process publish/subscribe bus.
///
/// Publishing enqueues and returns. Each consumer invocation runs in its own
/// task, so a failing or panicking consumer affects neither its siblings nor
/// later events.
pub struct EventBus {
    sender: mpsc::UnboundedSender<DomainEvent>,
    stop_sender: oneshot::Sender<()>,
    dispatcher: JoinHandle<()>,
}

impl EventBus {
    /// Starts declaring subscriptions.
    #[must_use]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// Returns a cloneable publishing handle.
    #[must_use]
    pub fn publisher(&self) -> EventBusPublisher {
        EventBusPublisher {
            sender: self.sender.clone(),
        }
    }

    /// Stops accepting events, dispatches those already queued and waits for
    /// every in-flight consumer.
    pub async fn shutdown(self) {
        let _ = self.stop_sender.send(());
        drop(self.sender);
        if let Err(error) = self.dispatcher.await {
            error!(error = %error, "event bus dispatcher terminated abnormally");
        }
    }
}

/// Publishing handle onto an [`EventBus`].
#[derive(Clone)]
pub struct EventBusPublisher {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

#[async_trait]
impl EventPublisher for EventBusPublisher {
    async fn publish(&self, event: DomainEvent) -> AppResult<()> {
        self.sender
            .send(event)
            .map_err(|_| AppError::Internal("event bus is stopped".to_owned()))
    }
}

async fn run_dispatcher(
    mut receiver: mpsc::UnboundedReceiver<DomainEvent>,
    subscriptions: Arc<SubscriptionTable>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            maybe_event = receiver.recv() => match maybe_event {
                Some(event) => dispatch(&subscriptions, event, &mut in_flight),
                None => break,
            },
            _ = &mut stop => {
                receiver.close();
                while let Some(event) = receiver.recv().await {
                    dispatch(&subscriptions, event, &mut in_flight);
                }
                break;
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                log_join_failure(joined);
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        log_join_failure(joined);
    }
}

fn dispatch(subscriptions: &SubscriptionTable, event: DomainEvent, in_flight: &mut JoinSet<()>) {
    let event_name = event.event_name();
    let Some(consumers) = subscriptions.get(event_name.as_str()) else {
        debug!(event_name = %event_name, "no consumer subscribed to event");
        return;
    };

    let event = Arc::new(event);
    for consumer in consumers {
        let consumer = Arc::clone(consumer);
        let event = Arc::clone(&event);
        in_flight.spawn(async move {
            let outcome = AssertUnwindSafe(consumer.consume(&event))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => error!(
                    consumer = consumer.name(),
                    event_name = %event.event_name(),
                    resource_id = %event.object_id,
                    error = %error,
                    "event consumer failed"
                ),
                Err(_) => error!(
                    consumer = consumer.name(),
                    event_name = %event.event_name(),
                    resource_id = %event.object_id,
                    "event consumer panicked"
                ),
            }
        });
    }
}

fn log_join_failure(joined: Result<(), tokio::task::JoinError>) {
    if let Err(error) = joined {
        error!(error = %error, "event consumer task aborted");
    }
}
