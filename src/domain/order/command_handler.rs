use crate::event_sourcing::{Event, Store};
use crate::utils::{retry_on_conflict, RetryConfig};

use super::aggregate::OrderAggregate;
use super::commands::OrderCommand;
use super::errors::OrderError;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: load → command → apply → save
//
// A save that loses a version race is retried from a fresh load, so the
// command is re-validated against whatever the winner wrote.
//
// ============================================================================

#[derive(Clone)]
pub struct OrderCommandHandler {
    store: Store,
    retry: RetryConfig,
}

impl OrderCommandHandler {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Rebuild the current state of an order.
    pub async fn load(&self, order_id: &str) -> Result<OrderAggregate, OrderError> {
        let mut order = OrderAggregate::new(order_id);
        self.store.load(order_id, &mut order).await?;
        Ok(order)
    }

    /// Handle a command and persist resulting events
    pub async fn handle(&self, order_id: &str, command: OrderCommand) -> Result<Vec<Event>, OrderError> {
        let command_name = command.name();

        let saved = retry_on_conflict(&self.retry, |_attempt| {
            let command = command.clone();
            async move {
                let mut order = self.load(order_id).await?;
                let applied = order.handle(command)?;
                Ok::<_, OrderError>(self.store.save(applied).await?)
            }
        })
        .await?;

        tracing::info!(
            order_id = %order_id,
            command = command_name,
            event_count = saved.len(),
            version = saved.last().map(|e| e.aggregate_version).unwrap_or_default(),
            "Order command handled"
        );

        Ok(saved)
    }
}
