use std::sync::Arc;

use async_trait::async_trait;

use crate::event_sourcing::core::{Event, Result};

// ============================================================================
// Driver - the contract every storage backend fulfils
// ============================================================================
//
// - `load` returns an aggregate's events ordered by version (empty if none)
// - `save` writes a batch atomically; any `(aggregate_id, aggregate_version)`
//   collision fails the whole batch with `OptimisticLockViolation`
// - an empty batch is a successful no-op
// - on success `save` stamps `id` and `created` into the given events
//
// How a backend enforces uniqueness is its own business (unique index +
// transaction, conditional write, staged copy under a lock); the observable
// behaviour is the same everywhere.
//
// ============================================================================

#[async_trait]
pub trait Driver: Send + Sync {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>>;

    async fn save(&self, events: &mut [Event]) -> Result<()>;
}

/// Optional capability: read the global log in `id` order.
///
/// Both reads start strictly after `position` and return at most `count`
/// events. `read_of_types` with an empty `types` filter returns nothing.
#[async_trait]
pub trait StreamReader: Send + Sync {
    async fn read_forward(&self, position: i64, count: usize) -> Result<Vec<Event>>;

    async fn read_of_types(&self, position: i64, count: usize, types: &[String]) -> Result<Vec<Event>>;
}

/// A driver that can also read the global log.
///
/// Blanket-implemented, so `Arc<dyn EventLog>` keeps both capabilities
/// through a stack of decorators.
pub trait EventLog: Driver + StreamReader {}

impl<T: Driver + StreamReader + ?Sized> EventLog for T {}

#[async_trait]
impl<D: Driver + ?Sized> Driver for Arc<D> {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        (**self).load(aggregate_id).await
    }

    async fn save(&self, events: &mut [Event]) -> Result<()> {
        (**self).save(events).await
    }
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for Box<D> {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        (**self).load(aggregate_id).await
    }

    async fn save(&self, events: &mut [Event]) -> Result<()> {
        (**self).save(events).await
    }
}

#[async_trait]
impl<R: StreamReader + ?Sized> StreamReader for Arc<R> {
    async fn read_forward(&self, position: i64, count: usize) -> Result<Vec<Event>> {
        (**self).read_forward(position, count).await
    }

    async fn read_of_types(&self, position: i64, count: usize, types: &[String]) -> Result<Vec<Event>> {
        (**self).read_of_types(position, count, types).await
    }
}

#[async_trait]
impl<R: StreamReader + ?Sized> StreamReader for Box<R> {
    async fn read_forward(&self, position: i64, count: usize) -> Result<Vec<Event>> {
        (**self).read_forward(position, count).await
    }

    async fn read_of_types(&self, position: i64, count: usize, types: &[String]) -> Result<Vec<Event>> {
        (**self).read_of_types(position, count, types).await
    }
}

/// First `(aggregate_id, aggregate_version)` pair repeated inside `events`.
pub(crate) fn duplicate_in_batch(events: &[Event]) -> Option<(&str, i64)> {
    let mut seen = std::collections::HashSet::with_capacity(events.len());
    events
        .iter()
        .map(|e| (e.aggregate_id.as_str(), e.aggregate_version))
        .find(|key| !seen.insert(*key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::{DomainEvent, PayloadRegistry};
    use crate::event_sourcing::store::InMemoryDriver;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct Pinged;

    impl DomainEvent for Pinged {
        const EVENT_TYPE: &'static str = "Pinged";
        const AGGREGATE_TYPE: &'static str = "Probe";
    }

    fn versioned(aggregate_id: &str, version: i64) -> Event {
        let mut event = Event::new(aggregate_id, Pinged);
        event.aggregate_version = version;
        event
    }

    #[test]
    fn test_duplicate_in_batch_detects_repeated_versions() {
        let events = vec![versioned("a", 1), versioned("b", 1), versioned("a", 1)];
        assert_eq!(duplicate_in_batch(&events), Some(("a", 1)));
    }

    #[test]
    fn test_duplicate_in_batch_accepts_distinct_pairs() {
        let events = vec![versioned("a", 1), versioned("a", 2), versioned("b", 1)];
        assert_eq!(duplicate_in_batch(&events), None);
    }

    #[tokio::test]
    async fn test_boxed_event_log_keeps_both_capabilities() {
        let registry = PayloadRegistry::builder().register::<Pinged>().unwrap().build();
        let log: Box<dyn EventLog> = Box::new(InMemoryDriver::new(registry));

        log.save(&mut [versioned("a", 1), versioned("b", 1)]).await.unwrap();

        assert_eq!(log.load("a").await.unwrap().len(), 1);
        let after_first = log.read_forward(1, 10).await.unwrap();
        assert_eq!(after_first.len(), 1);
        assert_eq!(after_first[0].aggregate_id, "b");
        assert_eq!(log.read_of_types(0, 10, &["Pinged".to_string()]).await.unwrap().len(), 2);
    }
}
