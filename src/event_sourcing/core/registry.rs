use std::collections::HashMap;
use std::sync::Arc;

use super::error::{Result, StoreError};
use super::event::{DomainEvent, EventPayload};

// ============================================================================
// Payload Registry - type name → typed decoder
// ============================================================================
//
// Persisted events only carry the payload type name. The registry maps that
// name back to a decoder monomorphized for the concrete payload type, so a
// stored event can be rehydrated without reflection.
//
// Registration needs `&mut self` and happens once at startup; afterwards the
// registry is shared read-only behind an `Arc`.
//
// ============================================================================

type DecodeFn = fn(&str) -> Result<Box<dyn EventPayload>>;

/// Decoder for one registered payload shape.
#[derive(Clone, Copy)]
pub struct PayloadDecoder {
    event_type: &'static str,
    aggregate_type: &'static str,
    decode: DecodeFn,
}

impl PayloadDecoder {
    fn of<P: DomainEvent>() -> Self {
        Self {
            event_type: P::EVENT_TYPE,
            aggregate_type: P::AGGREGATE_TYPE,
            decode: decode_payload::<P>,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    pub fn aggregate_type(&self) -> &'static str {
        self.aggregate_type
    }

    /// Deserialize `raw` into a freshly allocated payload.
    pub fn decode(&self, raw: &str) -> Result<Box<dyn EventPayload>> {
        (self.decode)(raw)
    }
}

impl std::fmt::Debug for PayloadDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadDecoder")
            .field("event_type", &self.event_type)
            .field("aggregate_type", &self.aggregate_type)
            .finish_non_exhaustive()
    }
}

fn decode_payload<P: DomainEvent>(raw: &str) -> Result<Box<dyn EventPayload>> {
    let payload: P = serde_json::from_str(raw)?;
    Ok(Box::new(payload))
}

#[derive(Debug, Default)]
pub struct PayloadRegistry {
    entries: HashMap<&'static str, PayloadDecoder>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Register payload type `P` under its `EVENT_TYPE`.
    ///
    /// Fails if another payload already claimed that name.
    pub fn register<P: DomainEvent>(&mut self) -> Result<()> {
        if self.entries.contains_key(P::EVENT_TYPE) {
            return Err(StoreError::AlreadyRegistered {
                event_type: P::EVENT_TYPE.to_string(),
            });
        }

        self.entries.insert(P::EVENT_TYPE, PayloadDecoder::of::<P>());
        tracing::debug!(
            event_type = P::EVENT_TYPE,
            aggregate_type = P::AGGREGATE_TYPE,
            "Registered event payload"
        );
        Ok(())
    }

    pub fn resolve_type(&self, event_type: &str) -> Result<PayloadDecoder> {
        self.entries
            .get(event_type)
            .copied()
            .ok_or_else(|| StoreError::not_registered(event_type))
    }

    /// Resolve `event_type` and decode `raw` into a new payload instance.
    pub fn decode(&self, event_type: &str, raw: &str) -> Result<Box<dyn EventPayload>> {
        self.resolve_type(event_type)?.decode(raw)
    }

    pub fn is_registered(&self, event_type: &str) -> bool {
        self.entries.contains_key(event_type)
    }

    /// Registered type names, sorted.
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.entries.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Chained registration ending in a shareable registry.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: PayloadRegistry,
}

impl RegistryBuilder {
    pub fn register<P: DomainEvent>(mut self) -> Result<Self> {
        self.registry.register::<P>()?;
        Ok(self)
    }

    pub fn build(self) -> Arc<PayloadRegistry> {
        Arc::new(self.registry)
    }
}

// ============================================================================
// Tests
// ============================================================================
