use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::event_sourcing::{Notifier, NotifyError, Packet};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

/// Publishes batch packets to a Redpanda/Kafka topic.
///
/// The record key is the first event type of the batch, so packets of the
/// same leading type land on the same partition.
pub struct RedpandaNotifier {
    producer: FutureProducer,
    topic: String,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaNotifier {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, NotifyError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| NotifyError::Transport(format!("failed to create producer: {e}")))?;

        tracing::info!(brokers = %brokers, topic = %topic, "Redpanda notifier ready");

        Ok(Self {
            producer,
            topic: topic.to_string(),
            circuit_breaker: CircuitBreaker::new(format!("redpanda:{topic}"), CircuitBreakerConfig::default()),
        })
    }
}

#[async_trait]
impl Notifier for RedpandaNotifier {
    async fn publish(&self, packet: &Packet) -> Result<(), NotifyError> {
        let payload = packet.to_json()?;
        let key = packet.types.first().cloned().unwrap_or_default();

        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

                self.producer
                    .send(record, Timeout::After(Duration::from_secs(5)))
                    .await
                    .map_err(|(e, _)| NotifyError::Transport(e.to_string()))?;

                Ok::<(), NotifyError>(())
            })
            .await;

        match result {
            Ok(()) => {
                tracing::debug!(topic = %self.topic, key = %key, "Published packet to Redpanda");
                Ok(())
            }
            Err(CircuitBreakerError::Open(name)) => Err(NotifyError::CircuitOpen(name)),
            Err(CircuitBreakerError::Inner(e)) => Err(e),
        }
    }
}
