use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{OrderItem, OrderStatus};
use crate::event_sourcing::{Aggregate, AppliedEvent, DomainEvent, Event, EventPayload, Versionable};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// State is only ever changed by `reduce`. Command handling validates against
// the current state and then goes through `apply`, so the in-memory state and
// the emitted events never drift apart.
//
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct OrderAggregate {
    versionable: Versionable,

    // Identity
    pub id: String,

    // Current State (derived from events)
    pub customer_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,

    // Optional fields
    pub confirmed_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_reason: Option<String>,
}

impl OrderAggregate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn exists(&self) -> bool {
        self.status != OrderStatus::New
    }

    /// Validate `command` against the current state and apply the resulting
    /// events. Nothing is applied when validation fails.
    pub fn handle(&mut self, command: OrderCommand) -> Result<Vec<AppliedEvent>, OrderError> {
        let event = match command {
            OrderCommand::CreateOrder { customer_id, items } => {
                if self.exists() {
                    return Err(OrderError::AlreadyExists(self.id.clone()));
                }
                validate_items(&items)?;

                self.event(OrderCreated { customer_id, items })
            }

            OrderCommand::UpdateItems { items, reason } => {
                match self.status {
                    OrderStatus::New => return Err(OrderError::NotFound(self.id.clone())),
                    OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled),
                    OrderStatus::Created => {}
                    status => return Err(OrderError::InvalidStatusTransition(status)),
                }
                validate_items(&items)?;

                self.event(OrderItemsUpdated { items, reason })
            }

            OrderCommand::ConfirmOrder => {
                match self.status {
                    OrderStatus::New => return Err(OrderError::NotFound(self.id.clone())),
                    OrderStatus::Created => {}
                    OrderStatus::Confirmed => return Err(OrderError::AlreadyConfirmed),
                    status => return Err(OrderError::InvalidStatusTransition(status)),
                }

                self.event(OrderConfirmed {
                    confirmed_at: Utc::now(),
                })
            }

            OrderCommand::ShipOrder {
                tracking_number,
                carrier,
            } => {
                match self.status {
                    OrderStatus::New => return Err(OrderError::NotFound(self.id.clone())),
                    OrderStatus::Confirmed => {}
                    OrderStatus::Created => return Err(OrderError::NotConfirmed),
                    status => return Err(OrderError::InvalidStatusTransition(status)),
                }

                self.event(OrderShipped {
                    tracking_number,
                    carrier,
                    shipped_at: Utc::now(),
                })
            }

            OrderCommand::DeliverOrder { signature } => {
                match self.status {
                    OrderStatus::New => return Err(OrderError::NotFound(self.id.clone())),
                    OrderStatus::Shipped => {}
                    _ => return Err(OrderError::NotShipped),
                }

                self.event(OrderDelivered {
                    delivered_at: Utc::now(),
                    signature,
                })
            }

            OrderCommand::CancelOrder { reason, cancelled_by } => {
                match self.status {
                    OrderStatus::New => return Err(OrderError::NotFound(self.id.clone())),
                    OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled),
                    OrderStatus::Delivered => return Err(OrderError::InvalidStatusTransition(self.status)),
                    _ => {} // Can cancel from Created, Confirmed, or Shipped
                }

                self.event(OrderCancelled { reason, cancelled_by })
            }
        };

        Ok(self.apply(vec![event]))
    }

    fn event<P: DomainEvent>(&self, payload: P) -> Event {
        Event::new(self.id.clone(), payload)
    }
}

fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyItems);
    }

    match items.iter().find(|item| item.quantity <= 0) {
        Some(item) => Err(OrderError::InvalidQuantity(item.quantity)),
        None => Ok(()),
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    fn reduce(&mut self, event_type: &str, payload: &dyn EventPayload) {
        match event_type {
            OrderCreated::EVENT_TYPE => {
                if let Some(e) = payload.downcast_ref::<OrderCreated>() {
                    self.customer_id = Some(e.customer_id);
                    self.items = e.items.clone();
                    self.status = OrderStatus::Created;
                }
            }
            OrderItemsUpdated::EVENT_TYPE => {
                if let Some(e) = payload.downcast_ref::<OrderItemsUpdated>() {
                    self.items = e.items.clone();
                }
            }
            OrderConfirmed::EVENT_TYPE => {
                if let Some(e) = payload.downcast_ref::<OrderConfirmed>() {
                    self.status = OrderStatus::Confirmed;
                    self.confirmed_at = Some(e.confirmed_at);
                }
            }
            OrderShipped::EVENT_TYPE => {
                if let Some(e) = payload.downcast_ref::<OrderShipped>() {
                    self.status = OrderStatus::Shipped;
                    self.tracking_number = Some(e.tracking_number.clone());
                    self.carrier = Some(e.carrier.clone());
                }
            }
            OrderDelivered::EVENT_TYPE => {
                if let Some(e) = payload.downcast_ref::<OrderDelivered>() {
                    self.status = OrderStatus::Delivered;
                    self.delivered_at = Some(e.delivered_at);
                }
            }
            OrderCancelled::EVENT_TYPE => {
                if let Some(e) = payload.downcast_ref::<OrderCancelled>() {
                    self.status = OrderStatus::Cancelled;
                    self.cancelled_reason = e.reason.clone();
                }
            }
            other => {
                tracing::warn!(order_id = %self.id, event_type = %other, "Ignoring unknown order event");
            }
        }
    }

    fn versionable(&self) -> &Versionable {
        &self.versionable
    }

    fn versionable_mut(&mut self) -> &mut Versionable {
        &mut self.versionable
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
