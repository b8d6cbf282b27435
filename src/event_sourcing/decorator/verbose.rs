use async_trait::async_trait;

use crate::event_sourcing::core::{Event, Result};
use crate::event_sourcing::store::{Driver, StreamReader};

/// Emits one structured log record per persisted event.
pub struct VerboseDriver<D> {
    inner: D,
}

impl<D: Driver> VerboseDriver<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: Driver> Driver for VerboseDriver<D> {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        self.inner.load(aggregate_id).await
    }

    async fn save(&self, events: &mut [Event]) -> Result<()> {
        self.inner.save(events).await?;

        for event in events.iter() {
            tracing::info!(
                event_id = event.id,
                event_type = %event.event_type,
                aggregate_id = %event.aggregate_id,
                aggregate_type = %event.aggregate_type,
                aggregate_version = event.aggregate_version,
                created = %event.created.to_rfc3339(),
                "Produced event"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl<D: Driver + StreamReader> StreamReader for VerboseDriver<D> {
    async fn read_forward(&self, position: i64, count: usize) -> Result<Vec<Event>> {
        self.inner.read_forward(position, count).await
    }

    async fn read_of_types(&self, position: i64, count: usize, types: &[String]) -> Result<Vec<Event>> {
        self.inner.read_of_types(position, count, types).await
    }
}
