// ============================================================================
// Event Sourcing Store - Drivers and the aggregate-facing Store
// ============================================================================
//
// `Driver` is the persistence contract; `Store` sits on top of any driver
// and speaks in terms of aggregates. Three backends ship with the crate:
// an in-process log (tests, demos), PostgreSQL and Redis.
//
// ============================================================================

pub mod driver;
pub mod event_store;
pub mod in_memory;
pub mod postgres;
pub mod redis;

pub use driver::{Driver, EventLog, StreamReader};
pub use event_store::Store;
pub use in_memory::InMemoryDriver;
pub use postgres::PostgresDriver;
pub use redis::RedisDriver;
