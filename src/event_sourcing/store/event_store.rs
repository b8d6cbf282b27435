use std::sync::Arc;

use crate::event_sourcing::core::{Aggregate, AppliedEvent, Event, Result};
use crate::event_sourcing::store::Driver;

// ============================================================================
// Store - load/save orchestration on top of any Driver
// ============================================================================
//
// Responsibilities:
// 1. Replay an aggregate's events into a caller-supplied instance
// 2. Persist the events produced by `apply`, in order
//
// The store performs no version checks and no retries of its own: the
// driver is the only authority on whether a batch wins or loses.
//
// ============================================================================

#[derive(Clone)]
pub struct Store {
    driver: Arc<dyn Driver>,
}

impl Store {
    pub fn new<D: Driver + 'static>(driver: D) -> Self {
        Self {
            driver: Arc::new(driver),
        }
    }

    pub fn from_shared(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Replay every event of `aggregate_id` into `aggregate`.
    ///
    /// An empty id means "new aggregate": nothing is loaded and the
    /// aggregate is left untouched.
    pub async fn load<A: Aggregate + ?Sized>(&self, aggregate_id: &str, aggregate: &mut A) -> Result<()> {
        if aggregate_id.is_empty() {
            return Ok(());
        }

        let events = self.driver.load(aggregate_id).await?;

        for event in &events {
            aggregate.reduce(&event.event_type, event.payload.as_ref());
            aggregate.versionable_mut().set_version(event.aggregate_version);
        }

        tracing::debug!(
            aggregate_id = %aggregate_id,
            event_count = events.len(),
            version = aggregate.version(),
            "Loaded aggregate"
        );

        Ok(())
    }

    /// Persist applied events and return them as stored (ids and timestamps
    /// filled in by the driver).
    pub async fn save(&self, applied_events: Vec<AppliedEvent>) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = applied_events
            .into_iter()
            .map(AppliedEvent::into_event)
            .collect();

        self.driver.save(&mut events).await?;

        Ok(events)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
