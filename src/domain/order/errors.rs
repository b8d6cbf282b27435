use super::value_objects::OrderStatus;
use crate::event_sourcing::StoreError;
use crate::utils::IsRetryable;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order '{0}' does not exist")]
    NotFound(String),

    #[error("Order '{0}' already exists")]
    AlreadyExists(String),

    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Order is already confirmed")]
    AlreadyConfirmed,

    #[error("Order must be confirmed before shipping")]
    NotConfirmed,

    #[error("Order must be shipped before delivery")]
    NotShipped,

    #[error("Cannot modify order in status: {0:?}")]
    InvalidStatusTransition(OrderStatus),

    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IsRetryable for OrderError {
    fn is_retryable(&self) -> bool {
        matches!(self, OrderError::Store(e) if e.is_conflict())
    }
}
