// ============================================================================
// Event Store Errors
// ============================================================================

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A persisted event names a payload type nobody registered.
    #[error("No type registered for '{event_type}'")]
    NotRegistered { event_type: String },

    #[error("Event payload already registered with name '{event_type}'")]
    AlreadyRegistered { event_type: String },

    /// The `(aggregate_id, aggregate_version)` pair already exists.
    ///
    /// The caller should reload the aggregate and retry its command.
    #[error("Optimistic locking violation: aggregate '{aggregate_id}' already has version {aggregate_version}")]
    OptimisticLockViolation {
        aggregate_id: String,
        aggregate_version: i64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    pub fn backend(err: impl Into<BoxError>) -> Self {
        StoreError::Backend(err.into())
    }

    pub fn conflict(aggregate_id: impl Into<String>, aggregate_version: i64) -> Self {
        StoreError::OptimisticLockViolation {
            aggregate_id: aggregate_id.into(),
            aggregate_version,
        }
    }

    pub fn not_registered(event_type: impl Into<String>) -> Self {
        StoreError::NotRegistered {
            event_type: event_type.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::OptimisticLockViolation { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_type() {
        assert_eq!(
            StoreError::not_registered("UnregisteredType").to_string(),
            "No type registered for 'UnregisteredType'"
        );
        assert_eq!(
            StoreError::AlreadyRegistered {
                event_type: "SomethingHappened".to_string()
            }
            .to_string(),
            "Event payload already registered with name 'SomethingHappened'"
        );
    }

    #[test]
    fn test_conflict_is_distinguishable() {
        let conflict = StoreError::conflict("order-1", 3);
        assert!(conflict.is_conflict());
        assert!(conflict.to_string().contains("order-1"));

        let backend = StoreError::backend("connection reset");
        assert!(!backend.is_conflict());
        assert_eq!(backend.to_string(), "Backend error: connection reset");
    }
}
