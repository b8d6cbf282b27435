use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info};

use crate::event_sourcing::core::{Event, EventRecord, PayloadRegistry, Result, StoreError};
use crate::event_sourcing::store::driver::{duplicate_in_batch, Driver, StreamReader};

// ============================================================================
// Redis Driver - conditional put via Lua
// ============================================================================
//
// Key layout (under a configurable prefix):
//
//   {prefix}:aggregate:{aggregate_id}   hash   version → record JSON
//   {prefix}:sequence                   string global id counter
//   {prefix}:stream                     zset   score = id, member = record JSON
//
// A save runs as a single script: it first checks that no version of the
// batch exists yet, and only then allocates ids and writes. Redis runs
// scripts atomically, so a batch is either fully visible or not at all.
// All keys of a batch must live on one node (no cluster slot spreading).
//
// ============================================================================

/// KEYS[1] = sequence, KEYS[2] = stream, KEYS[2 + i] = aggregate hash of event i
/// ARGV[2i - 1] = version of event i, ARGV[2i] = record JSON of event i without `id`
///
/// The id is spliced in as text; cjson would print large numbers in exponent
/// form. Returns the first allocated id, or `-i` when event i collides.
const APPEND_SCRIPT: &str = r#"
local count = #KEYS - 2
for i = 1, count do
  if redis.call('HEXISTS', KEYS[i + 2], ARGV[i * 2 - 1]) == 1 then
    return -i
  end
end
local first = redis.call('INCRBY', KEYS[1], count) - count + 1
for i = 1, count do
  local id = string.format('%d', first + i - 1)
  local encoded = '{"id":' .. id .. ',' .. string.sub(ARGV[i * 2], 2)
  redis.call('HSET', KEYS[i + 2], ARGV[i * 2 - 1], encoded)
  redis.call('ZADD', KEYS[2], id, encoded)
end
return first
"#;

/// Page size used when filtering the stream by type.
const SCAN_PAGE: usize = 256;

pub struct RedisDriver {
    conn: MultiplexedConnection,
    key_prefix: String,
    registry: Arc<PayloadRegistry>,
    append: Script,
}

impl RedisDriver {
    pub fn new(conn: MultiplexedConnection, key_prefix: &str, registry: Arc<PayloadRegistry>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.to_string(),
            registry,
            append: Script::new(APPEND_SCRIPT),
        }
    }

    /// Open a multiplexed connection to `url` and build the driver on it.
    pub async fn connect(url: &str, key_prefix: &str, registry: Arc<PayloadRegistry>) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        info!(url = %url, key_prefix = %key_prefix, "Connected to Redis");

        Ok(Self::new(conn, key_prefix, registry))
    }

    fn aggregate_key(&self, aggregate_id: &str) -> String {
        format!("{}:aggregate:{}", self.key_prefix, aggregate_id)
    }

    fn sequence_key(&self) -> String {
        format!("{}:sequence", self.key_prefix)
    }

    fn stream_key(&self) -> String {
        format!("{}:stream", self.key_prefix)
    }

    /// Record JSON with the `id` member left out, for the script to fill in.
    fn record_body(event: &Event, created: DateTime<Utc>) -> Result<String> {
        let mut record = EventRecord::from_event(event)?;
        record.created = created;

        let mut value = serde_json::to_value(&record)?;
        if let Some(fields) = value.as_object_mut() {
            fields.remove("id");
        }
        Ok(value.to_string())
    }

    fn decode_records(&self, raw: Vec<String>) -> Result<Vec<Event>> {
        raw.iter()
            .map(|json| EventRecord::from_json(json)?.into_event(&self.registry))
            .collect()
    }

    /// Raw stream members with an id greater than `position`.
    async fn stream_page(&self, position: i64, count: usize) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrangebyscore_limit(
                self.stream_key(),
                format!("({position}"),
                "+inf",
                0,
                isize::try_from(count).unwrap_or(isize::MAX),
            )
            .await?;
        Ok(members)
    }
}

#[async_trait]
impl Driver for RedisDriver {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        let mut conn = self.conn.clone();
        let stored: HashMap<String, String> = conn.hgetall(self.aggregate_key(aggregate_id)).await?;

        let mut records = stored
            .values()
            .map(|json| EventRecord::from_json(json))
            .collect::<Result<Vec<_>>>()?;
        records.sort_by_key(|r| r.aggregate_version);

        debug!(aggregate_id = %aggregate_id, count = records.len(), "Loaded events from Redis");

        records
            .into_iter()
            .map(|record| record.into_event(&self.registry))
            .collect()
    }

    async fn save(&self, events: &mut [Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        if let Some((aggregate_id, version)) = duplicate_in_batch(events) {
            return Err(StoreError::conflict(aggregate_id, version));
        }

        let created = Utc::now();
        let mut invocation = self.append.prepare_invoke();
        invocation.key(self.sequence_key()).key(self.stream_key());

        for event in events.iter() {
            invocation
                .key(self.aggregate_key(&event.aggregate_id))
                .arg(event.aggregate_version)
                .arg(Self::record_body(event, created)?);
        }

        let mut conn = self.conn.clone();
        let first_id: i64 = invocation.invoke_async(&mut conn).await?;

        if first_id < 0 {
            let index = usize::try_from(-first_id - 1).unwrap_or(0);
            let event = &events[index.min(events.len() - 1)];
            return Err(StoreError::conflict(event.aggregate_id.clone(), event.aggregate_version));
        }

        for (offset, event) in events.iter_mut().enumerate() {
            event.id = first_id + offset as i64;
            event.created = created;
        }

        info!(
            key_prefix = %self.key_prefix,
            first_id = first_id,
            event_count = events.len(),
            "Appended events to Redis"
        );

        Ok(())
    }
}

#[async_trait]
impl StreamReader for RedisDriver {
    async fn read_forward(&self, position: i64, count: usize) -> Result<Vec<Event>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let members = self.stream_page(position, count).await?;
        self.decode_records(members)
    }

    async fn read_of_types(&self, position: i64, count: usize, types: &[String]) -> Result<Vec<Event>> {
        if types.is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        let mut matched = Vec::new();
        let mut cursor = position;

        loop {
            let page = self.stream_page(cursor, SCAN_PAGE).await?;
            let exhausted = page.len() < SCAN_PAGE;

            for json in page {
                let record = EventRecord::from_json(&json)?;
                cursor = record.id;
                if types.iter().any(|t| *t == record.event_type) {
                    matched.push(record.into_event(&self.registry)?);
                    if matched.len() == count {
                        return Ok(matched);
                    }
                }
            }

            if exhausted {
                return Ok(matched);
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::DomainEvent;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct SomethingHappened {
        data: String,
    }

    impl DomainEvent for SomethingHappened {
        const EVENT_TYPE: &'static str = "SomethingHappened";
        const AGGREGATE_TYPE: &'static str = "SampleAggregate";
    }

    fn registry() -> Arc<PayloadRegistry> {
        PayloadRegistry::builder()
            .register::<SomethingHappened>()
            .unwrap()
            .build()
    }

    fn happened(aggregate_id: &str, version: i64, data: &str) -> Event {
        let mut event = Event::new(aggregate_id, SomethingHappened { data: data.to_string() });
        event.aggregate_version = version;
        event
    }

    #[test]
    fn test_script_checks_before_writing() {
        let check = APPEND_SCRIPT.find("HEXISTS").unwrap();
        let allocate = APPEND_SCRIPT.find("INCRBY").unwrap();
        let write = APPEND_SCRIPT.find("HSET").unwrap();

        assert!(check < allocate);
        assert!(allocate < write);
    }

    #[test]
    fn test_script_splices_id_as_text() {
        assert!(APPEND_SCRIPT.contains("string.format('%d'"));
        assert!(!APPEND_SCRIPT.contains("cjson"));
    }

    #[test]
    fn test_record_body_keeps_large_ids_exact() {
        let event = happened("1", 123_456_789_012_345, "a");
        let body = RedisDriver::record_body(&event, Utc::now()).unwrap();
        assert!(!body.contains("\"id\""));

        let id: i64 = 100_000_000_000_001;
        let stored = format!("{{\"id\":{},{}", id, &body[1..]);
        let record = EventRecord::from_json(&stored).unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.aggregate_version, 123_456_789_012_345);
        assert_eq!(record.event_type, "SomethingHappened");
    }

    async fn live_driver() -> RedisDriver {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let prefix = format!("eventlog-test-{}", uuid::Uuid::new_v4().simple());
        RedisDriver::connect(&url, &prefix, registry()).await.unwrap()
    }

    #[test]
    fn test_script_reports_collisions_as_negative_index() {
        assert!(APPEND_SCRIPT.contains("return -i"));
        assert!(APPEND_SCRIPT.trim_end().ends_with("return first"));
    }

    /// Requires Redis: `REDIS_URL=redis://... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_conditional_write_against_live_redis() {
        let driver = live_driver().await;

        let mut batch = vec![happened("1", 1, "a"), happened("1", 2, "b")];
        driver.save(&mut batch).await.unwrap();
        assert_eq!(batch[1].id, batch[0].id + 1);

        let mut stale = vec![happened("2", 1, "x"), happened("1", 2, "stale")];
        let err = driver.save(&mut stale).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::OptimisticLockViolation { aggregate_version: 2, .. }
        ));
        assert!(driver.load("2").await.unwrap().is_empty());

        let loaded = driver.load("1").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded[1].payload_as::<SomethingHappened>(),
            Some(&SomethingHappened { data: "b".to_string() })
        );

        let forward = driver.read_forward(batch[0].id, 10).await.unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].id, batch[1].id);

        let none = driver.read_of_types(0, 10, &[]).await.unwrap();
        assert!(none.is_empty());
    }
}
