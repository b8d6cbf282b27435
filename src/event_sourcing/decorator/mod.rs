// ============================================================================
// Driver decorators
// ============================================================================
//
// Wrappers that hold an inner `Driver` and attach a side effect to a
// successful save. They implement `Driver` themselves, so they nest in any
// order around any backend.
//
// ============================================================================

pub mod notification;
pub mod verbose;

pub use notification::{NotificationDriver, Notifier, NotifyError, Packet};
pub use verbose::VerboseDriver;
