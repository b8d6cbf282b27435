// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// Backend-agnostic building blocks: the event model, the payload registry,
// the persisted record shape, the aggregate/versioning protocol and the
// error taxonomy. Nothing here knows about a concrete database.
//
// ============================================================================

pub mod aggregate;
pub mod error;
pub mod event;
pub mod record;
pub mod registry;

pub use aggregate::{apply, Aggregate, AppliedEvent, Versionable};
pub use error::{BoxError, Result, StoreError};
pub use event::{DomainEvent, Event, EventPayload, UNASSIGNED_ID};
pub use record::EventRecord;
pub use registry::{PayloadDecoder, PayloadRegistry, RegistryBuilder};
