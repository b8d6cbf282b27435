use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

// ============================================================================
// Event - the persisted record of a single fact about an aggregate
// ============================================================================
//
// An event carries a type name (the registry key), the identity and version
// of the aggregate it belongs to, and an owned payload. `id` and `created`
// are assigned by the driver when the event is persisted.
//
// ============================================================================

/// Marker value for an event that has not been persisted yet.
pub const UNASSIGNED_ID: i64 = 0;

#[derive(Clone, Debug)]
pub struct Event {
    /// Global stream position, assigned by the backend at save time.
    pub id: i64,
    pub event_type: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    /// 1-based position of this event within its aggregate.
    pub aggregate_version: i64,
    pub payload: Box<dyn EventPayload>,
    pub created: DateTime<Utc>,
}

impl Event {
    /// Create a not-yet-versioned event for `aggregate_id`.
    ///
    /// Type name and aggregate type are taken from the payload. The version
    /// is stamped later by `apply`.
    pub fn new<P: DomainEvent>(aggregate_id: impl Into<String>, payload: P) -> Self {
        Self::from_boxed(aggregate_id, Box::new(payload))
    }

    pub fn from_boxed(aggregate_id: impl Into<String>, payload: Box<dyn EventPayload>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            event_type: payload.payload_type().to_string(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: payload.aggregate_type().to_string(),
            aggregate_version: 0,
            payload,
            created: Utc::now(),
        }
    }

    /// Borrow the payload as its concrete type.
    pub fn payload_as<P: DomainEvent>(&self) -> Option<&P> {
        self.payload.downcast_ref::<P>()
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNASSIGNED_ID
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Typed payload of an event.
///
/// Every payload shape that can be stored declares the name it is persisted
/// under and the kind of aggregate that emits it. Registration in a
/// [`PayloadRegistry`](super::registry::PayloadRegistry) is by type, so only
/// owned values can ever be rehydrated.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    const EVENT_TYPE: &'static str;
    const AGGREGATE_TYPE: &'static str;
}

/// Object-safe view over any [`DomainEvent`].
///
/// Implemented automatically; application code only implements
/// `DomainEvent`.
pub trait EventPayload: fmt::Debug + Send + Sync {
    fn payload_type(&self) -> &'static str;
    fn aggregate_type(&self) -> &'static str;
    fn to_json(&self) -> serde_json::Result<String>;
    fn as_any(&self) -> &dyn Any;
    fn clone_box(&self) -> Box<dyn EventPayload>;
}

impl<E: DomainEvent> EventPayload for E {
    fn payload_type(&self) -> &'static str {
        E::EVENT_TYPE
    }

    fn aggregate_type(&self) -> &'static str {
        E::AGGREGATE_TYPE
    }

    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn EventPayload> {
        Box::new(self.clone())
    }
}

impl dyn EventPayload + '_ {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl Clone for Box<dyn EventPayload> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// ============================================================================
// Tests
// ============================================================================
