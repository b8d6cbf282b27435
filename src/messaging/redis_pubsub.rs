use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

use crate::event_sourcing::{Notifier, NotifyError, Packet};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

// ============================================================================
// Redis Pub/Sub notifier
// ============================================================================
//
// PUBLISHes the JSON packet of every committed batch on one channel.
// Subscribers that are not connected at publish time miss the message;
// they are expected to catch up through the stream reader.
//
// ============================================================================

pub struct RedisNotifier {
    conn: MultiplexedConnection,
    channel: String,
    circuit_breaker: CircuitBreaker,
}

impl RedisNotifier {
    pub fn new(conn: MultiplexedConnection, channel: &str) -> Self {
        Self {
            conn,
            channel: channel.to_string(),
            circuit_breaker: CircuitBreaker::new(format!("redis:{channel}"), CircuitBreakerConfig::default()),
        }
    }

    pub async fn connect(url: &str, channel: &str) -> Result<Self, NotifyError> {
        let client = Client::open(url).map_err(transport)?;
        let conn = client.get_multiplexed_async_connection().await.map_err(transport)?;

        tracing::info!(url = %url, channel = %channel, "Redis notifier ready");

        Ok(Self::new(conn, channel))
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

fn transport(err: redis::RedisError) -> NotifyError {
    NotifyError::Transport(err.to_string())
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn publish(&self, packet: &Packet) -> Result<(), NotifyError> {
        let payload = packet.to_json()?;
        let mut conn = self.conn.clone();

        let result = self
            .circuit_breaker
            .call(async {
                let receivers: i64 = conn.publish(&self.channel, &payload).await.map_err(transport)?;
                Ok::<i64, NotifyError>(receivers)
            })
            .await;

        match result {
            Ok(receivers) => {
                tracing::debug!(
                    channel = %self.channel,
                    receivers = receivers,
                    types = ?packet.types,
                    "Published packet to Redis"
                );
                Ok(())
            }
            Err(CircuitBreakerError::Open(name)) => Err(NotifyError::CircuitOpen(name)),
            Err(CircuitBreakerError::Inner(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_redis_errors_become_transport_errors() {
        let err = transport(redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")));

        assert!(matches!(err, NotifyError::Transport(ref msg) if msg.contains("connection refused")));
    }

    /// Requires Redis: `REDIS_URL=redis://... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_publish_against_live_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let notifier = RedisNotifier::connect(&url, "eventlog-test").await.unwrap();

        let packet = Packet {
            types: vec!["OrderCreated".to_string()],
            events: BTreeMap::from([("OrderCreated".to_string(), vec![1])]),
        };

        notifier.publish(&packet).await.unwrap();
        assert_eq!(notifier.channel(), "eventlog-test");
    }
}
