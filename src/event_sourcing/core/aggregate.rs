use serde::{Deserialize, Serialize};

use super::event::{Event, EventPayload};

// ============================================================================
// Aggregate Protocol - replay target + version tracking
// ============================================================================
//
// An aggregate's state is derived purely from its events:
//
//   fresh (version 0) ──load──▶ hydrated (version = last replayed event)
//        ▲                              │
//        └──────── apply ◀── command ───┘
//
// `reduce` folds one event into memory. `apply` is how command methods emit
// new events: it reduces first, then bumps the version and stamps it onto
// the event. The aggregate never talks to the store; conflicting writers
// are caught when the stamped versions are saved.
//
// ============================================================================

/// Version tracker embedded in every aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versionable {
    version: i64,
}

impl Versionable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /// Advance to the next version and return it.
    pub fn next(&mut self) -> i64 {
        self.version += 1;
        self.version
    }
}

/// A unit of state rebuilt by replaying its events.
pub trait Aggregate: Send {
    /// Fold one event into the in-memory state.
    fn reduce(&mut self, event_type: &str, payload: &dyn EventPayload);

    fn versionable(&self) -> &Versionable;

    fn versionable_mut(&mut self) -> &mut Versionable;

    fn version(&self) -> i64 {
        self.versionable().version()
    }

    /// Reduce and version `events`; see [`apply`].
    fn apply(&mut self, events: Vec<Event>) -> Vec<AppliedEvent>
    where
        Self: Sized,
    {
        apply(self, events)
    }
}

/// An event already folded into its aggregate and stamped with the next
/// version. Only [`apply`] creates these.
#[derive(Debug, Clone)]
pub struct AppliedEvent {
    event: Event,
}

impl AppliedEvent {
    pub(crate) fn new(event: Event) -> Self {
        Self { event }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }
}

/// Reduce each event into `aggregate`, then stamp it with the next version.
///
/// Versions continue from the aggregate's current version without gaps.
pub fn apply<A: Aggregate + ?Sized>(aggregate: &mut A, events: Vec<Event>) -> Vec<AppliedEvent> {
    events
        .into_iter()
        .map(|mut event| {
            aggregate.reduce(&event.event_type, event.payload.as_ref());
            event.aggregate_version = aggregate.versionable_mut().next();
            AppliedEvent::new(event)
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
