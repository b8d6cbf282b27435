// ============================================================================
// Messaging - notification sinks for committed batches
// ============================================================================

pub mod redis_pubsub;
#[cfg(feature = "kafka")]
pub mod redpanda;

pub use redis_pubsub::RedisNotifier;
#[cfg(feature = "kafka")]
pub use redpanda::RedpandaNotifier;
