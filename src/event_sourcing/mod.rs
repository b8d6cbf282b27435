// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic, reusable event sourcing infrastructure.
// Domain-specific code is in src/domain/
//
// ============================================================================

// Core abstractions (works with any aggregate)
mod core;

// Persistence and driver decorators
pub mod decorator;
pub mod store;

pub use self::core::*;
pub use decorator::{Notifier, NotificationDriver, NotifyError, Packet, VerboseDriver};
pub use store::*;
