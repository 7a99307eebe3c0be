//! Best-effort publishing of order events.
//!
//! Publishing happens after the order is committed. A failure is logged and
//! never undoes the write that raised the event.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::events::OrderEvent;
use crate::{BookstoreError, Result};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> Result<()>;
}

/// Publishes `<prefix>.orders.<event>` JSON messages on NATS.
#[derive(Clone, Debug)]
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }

    pub fn subject(&self, event: &OrderEvent) -> String {
        format!("{}.orders.{}", self.prefix, event.name())
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<()> {
        let payload = serde_json::to_vec(event).map_err(|e| BookstoreError::StorageError(e.to_string()))?;
        self.client
            .publish(self.subject(event), payload.into())
            .await
            .map_err(|e| BookstoreError::StorageError(format!("publish failed: {e}")))
    }
}

/// Used when no broker is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<()> {
        tracing::trace!(order_id = %event.order_id(), event = event.name(), "no event broker configured");
        Ok(())
    }
}

/// Keeps published events in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<OrderEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| BookstoreError::StorageError("event log poisoned".into()))?
            .push(event.clone());
        Ok(())
    }
}
