use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::event_sourcing::core::{Event, EventRecord, PayloadRegistry, Result, StoreError};
use crate::event_sourcing::store::driver::{duplicate_in_batch, Driver, StreamReader};

// ============================================================================
// In-Memory Driver - test double with real persistence semantics
// ============================================================================
//
// Events are kept as serialized records, so every load goes through the
// payload registry exactly like a database-backed driver would.
//
// - ids are sequential, starting at 1
// - the clock starts at 2000-01-01T00:00:00Z and advances 1s per event
// - a batch is validated completely before anything is written, all under
//   one write lock, so a conflicting batch leaves no trace
//
// ============================================================================

/// 2000-01-01T00:00:00Z
const CLOCK_START: i64 = 946_684_800;

pub struct InMemoryDriver {
    registry: Arc<PayloadRegistry>,
    state: RwLock<MemoryLog>,
}

struct MemoryLog {
    sequence: i64,
    clock: DateTime<Utc>,
    /// Every record in id order.
    log: Vec<EventRecord>,
    /// aggregate id → version → index into `log`
    index: HashMap<String, BTreeMap<i64, usize>>,
}

impl MemoryLog {
    fn new() -> Self {
        Self {
            sequence: 0,
            clock: DateTime::from_timestamp(CLOCK_START, 0).unwrap_or(DateTime::UNIX_EPOCH),
            log: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn contains(&self, aggregate_id: &str, version: i64) -> bool {
        self.index
            .get(aggregate_id)
            .is_some_and(|versions| versions.contains_key(&version))
    }

    /// Position of the first record with an id greater than `position`.
    fn start_after(&self, position: i64) -> usize {
        self.log.partition_point(|r| r.id <= position)
    }
}

impl InMemoryDriver {
    pub fn new(registry: Arc<PayloadRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(MemoryLog::new()),
        }
    }

    /// The whole log in id order.
    pub async fn stream(&self) -> Result<Vec<Event>> {
        let state = self.state.read().await;
        self.decode_all(state.log.iter())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.log.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn decode_all<'a>(&self, records: impl Iterator<Item = &'a EventRecord>) -> Result<Vec<Event>> {
        records
            .map(|record| record.clone().into_event(&self.registry))
            .collect()
    }
}

#[async_trait]
impl Driver for InMemoryDriver {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        let state = self.state.read().await;

        let Some(versions) = state.index.get(aggregate_id) else {
            return Ok(Vec::new());
        };

        self.decode_all(versions.values().map(|&i| &state.log[i]))
    }

    async fn save(&self, events: &mut [Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        if let Some((aggregate_id, version)) = duplicate_in_batch(events) {
            return Err(StoreError::conflict(aggregate_id, version));
        }

        // Serialize up front so a bad payload cannot leave a partial write.
        let mut records = events
            .iter()
            .map(EventRecord::from_event)
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.state.write().await;

        if let Some(taken) = records
            .iter()
            .find(|r| state.contains(&r.aggregate_id, r.aggregate_version))
        {
            return Err(StoreError::conflict(taken.aggregate_id.clone(), taken.aggregate_version));
        }

        for (event, record) in events.iter_mut().zip(records.iter_mut()) {
            state.sequence += 1;
            record.id = state.sequence;
            record.created = state.clock;
            state.clock += Duration::seconds(1);

            event.id = record.id;
            event.created = record.created;
        }

        for record in records {
            let position = state.log.len();
            state
                .index
                .entry(record.aggregate_id.clone())
                .or_default()
                .insert(record.aggregate_version, position);
            state.log.push(record);
        }

        tracing::debug!(
            event_count = events.len(),
            last_id = state.sequence,
            "Saved events in memory"
        );

        Ok(())
    }
}

#[async_trait]
impl StreamReader for InMemoryDriver {
    async fn read_forward(&self, position: i64, count: usize) -> Result<Vec<Event>> {
        let state = self.state.read().await;
        let start = state.start_after(position);

        self.decode_all(state.log[start..].iter().take(count))
    }

    async fn read_of_types(&self, position: i64, count: usize, types: &[String]) -> Result<Vec<Event>> {
        if types.is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let start = state.start_after(position);

        self.decode_all(
            state.log[start..]
                .iter()
                .filter(|r| types.iter().any(|t| *t == r.event_type))
                .take(count),
        )
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
