use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::event::Event;
use super::registry::PayloadRegistry;

// ============================================================================
// Event Record - the serialized row every backend persists
// ============================================================================
//
// The payload is stored as JSON text next to its type name; the type name is
// the only thing needed to pick the decoder on the way back.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub aggregate_version: i64,
    pub payload: String,
    pub created: DateTime<Utc>,
}

impl EventRecord {
    pub fn from_event(event: &Event) -> Result<Self> {
        Ok(Self {
            id: event.id,
            event_type: event.event_type.clone(),
            aggregate_id: event.aggregate_id.clone(),
            aggregate_type: event.aggregate_type.clone(),
            aggregate_version: event.aggregate_version,
            payload: event.payload.to_json()?,
            created: event.created,
        })
    }

    /// Rehydrate the record, resolving its payload through `registry`.
    pub fn into_event(self, registry: &PayloadRegistry) -> Result<Event> {
        let payload = registry.decode(&self.event_type, &self.payload)?;

        Ok(Event {
            id: self.id,
            event_type: self.event_type,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            aggregate_version: self.aggregate_version,
            payload,
            created: self.created,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::{DomainEvent, StoreError};
    use chrono::TimeZone;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct AccountOpened {
        owner: String,
        limit: u64,
    }

    impl DomainEvent for AccountOpened {
        const EVENT_TYPE: &'static str = "AccountOpened";
        const AGGREGATE_TYPE: &'static str = "Account";
    }

    fn sample_event() -> Event {
        let mut event = Event::new(
            "acc-1",
            AccountOpened {
                owner: "ada".to_string(),
                limit: 500,
            },
        );
        event.id = 42;
        event.aggregate_version = 1;
        event.created = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        event
    }

    #[test]
    fn test_record_keeps_every_column() {
        let record = EventRecord::from_event(&sample_event()).unwrap();

        assert_eq!(record.id, 42);
        assert_eq!(record.event_type, "AccountOpened");
        assert_eq!(record.aggregate_id, "acc-1");
        assert_eq!(record.aggregate_type, "Account");
        assert_eq!(record.aggregate_version, 1);
        assert_eq!(record.payload, r#"{"owner":"ada","limit":500}"#);
    }

    #[test]
    fn test_record_json_uses_rfc3339_and_type_column() {
        let json = EventRecord::from_event(&sample_event()).unwrap().to_json().unwrap();

        assert!(json.contains(r#""type":"AccountOpened""#));
        assert!(json.contains(r#""created":"2000-01-01T00:00:00Z""#));

        let parsed = EventRecord::from_json(&json).unwrap();
        assert_eq!(parsed.created, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_into_event_decodes_through_registry() {
        let mut registry = PayloadRegistry::new();
        registry.register::<AccountOpened>().unwrap();

        let record = EventRecord::from_event(&sample_event()).unwrap();
        let event = record.into_event(&registry).unwrap();

        assert_eq!(event.id, 42);
        assert_eq!(
            event.payload_as::<AccountOpened>(),
            Some(&AccountOpened {
                owner: "ada".to_string(),
                limit: 500
            })
        );
    }

    #[test]
    fn test_into_event_requires_registration() {
        let record = EventRecord::from_event(&sample_event()).unwrap();
        let err = record.into_event(&PayloadRegistry::new()).unwrap_err();

        assert!(matches!(err, StoreError::NotRegistered { event_type } if event_type == "AccountOpened"));
    }
}
