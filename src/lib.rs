// ============================================================================
// eventlog - append-only event store with pluggable drivers
// ============================================================================
//
// - event_sourcing: events, payload registry, aggregates, drivers, Store
// - messaging: notification sinks for the notification decorator
// - utils: circuit breaker and conflict retry
// - domain: a sample order aggregate
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod messaging;
pub mod telemetry;
pub mod utils;
