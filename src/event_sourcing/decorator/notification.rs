use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::event_sourcing::core::{Event, Result};
use crate::event_sourcing::store::{Driver, StreamReader};

// ============================================================================
// Notification decorator
// ============================================================================
//
// After the inner driver has committed a non-empty batch, a `Packet`
// describing it is handed to a `Notifier`. The save outcome is already
// decided at that point: a failed publish is logged and dropped, it never
// turns a successful save into an error.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to encode notification: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Notification transport error: {0}")]
    Transport(String),

    #[error("Notification sink '{0}' unavailable (circuit open)")]
    CircuitOpen(String),
}

/// Summary of one committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Distinct event types in first-seen order.
    pub types: Vec<String>,
    /// Ids of the saved events, grouped by type, in save order.
    pub events: BTreeMap<String, Vec<i64>>,
}

impl Packet {
    pub fn from_events(events: &[Event]) -> Self {
        let mut packet = Packet::default();

        for event in events {
            let ids = packet.events.entry(event.event_type.clone()).or_default();
            if ids.is_empty() {
                packet.types.push(event.event_type.clone());
            }
            ids.push(event.id);
        }

        packet
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn to_json(&self) -> std::result::Result<String, NotifyError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, packet: &Packet) -> std::result::Result<(), NotifyError>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn publish(&self, packet: &Packet) -> std::result::Result<(), NotifyError> {
        (**self).publish(packet).await
    }
}

pub struct NotificationDriver<D, N> {
    inner: D,
    notifier: N,
}

impl<D: Driver, N: Notifier> NotificationDriver<D, N> {
    pub fn new(inner: D, notifier: N) -> Self {
        Self { inner, notifier }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: Driver, N: Notifier> Driver for NotificationDriver<D, N> {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        self.inner.load(aggregate_id).await
    }

    async fn save(&self, events: &mut [Event]) -> Result<()> {
        self.inner.save(events).await?;

        if events.is_empty() {
            return Ok(());
        }

        let packet = Packet::from_events(events);
        if let Err(e) = self.notifier.publish(&packet).await {
            tracing::warn!(
                error = %e,
                types = ?packet.types,
                event_count = events.len(),
                "Failed to publish notification for saved events"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl<D: Driver + StreamReader, N: Notifier> StreamReader for NotificationDriver<D, N> {
    async fn read_forward(&self, position: i64, count: usize) -> Result<Vec<Event>> {
        self.inner.read_forward(position, count).await
    }

    async fn read_of_types(&self, position: i64, count: usize, types: &[String]) -> Result<Vec<Event>> {
        self.inner.read_of_types(position, count, types).await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
