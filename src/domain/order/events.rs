use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::OrderItem;
use crate::event_sourcing::{DomainEvent, PayloadRegistry, Result};

// ============================================================================
// Order Events - one payload type per fact
// ============================================================================

pub const ORDER_AGGREGATE_TYPE: &str = "Order";

/// Order Created - Initial event in order lifecycle
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderCreated {
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
}

impl DomainEvent for OrderCreated {
    const EVENT_TYPE: &'static str = "OrderCreated";
    const AGGREGATE_TYPE: &'static str = ORDER_AGGREGATE_TYPE;
}

/// Order Items Updated - Order contents modified
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItemsUpdated {
    pub items: Vec<OrderItem>,
    pub reason: Option<String>,
}

impl DomainEvent for OrderItemsUpdated {
    const EVENT_TYPE: &'static str = "OrderItemsUpdated";
    const AGGREGATE_TYPE: &'static str = ORDER_AGGREGATE_TYPE;
}

/// Order Confirmed - Order accepted for fulfillment
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderConfirmed {
    pub confirmed_at: DateTime<Utc>,
}

impl DomainEvent for OrderConfirmed {
    const EVENT_TYPE: &'static str = "OrderConfirmed";
    const AGGREGATE_TYPE: &'static str = ORDER_AGGREGATE_TYPE;
}

/// Order Shipped - Order dispatched to customer
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderShipped {
    pub tracking_number: String,
    pub carrier: String,
    pub shipped_at: DateTime<Utc>,
}

impl DomainEvent for OrderShipped {
    const EVENT_TYPE: &'static str = "OrderShipped";
    const AGGREGATE_TYPE: &'static str = ORDER_AGGREGATE_TYPE;
}

/// Order Delivered - Order successfully delivered
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderDelivered {
    pub delivered_at: DateTime<Utc>,
    pub signature: Option<String>,
}

impl DomainEvent for OrderDelivered {
    const EVENT_TYPE: &'static str = "OrderDelivered";
    const AGGREGATE_TYPE: &'static str = ORDER_AGGREGATE_TYPE;
}

/// Order Cancelled - Order lifecycle ended
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderCancelled {
    pub reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
}

impl DomainEvent for OrderCancelled {
    const EVENT_TYPE: &'static str = "OrderCancelled";
    const AGGREGATE_TYPE: &'static str = ORDER_AGGREGATE_TYPE;
}

/// Register every order payload type.
pub fn register_payloads(registry: &mut PayloadRegistry) -> Result<()> {
    registry.register::<OrderCreated>()?;
    registry.register::<OrderItemsUpdated>()?;
    registry.register::<OrderConfirmed>()?;
    registry.register::<OrderShipped>()?;
    registry.register::<OrderDelivered>()?;
    registry.register::<OrderCancelled>()?;
    Ok(())
}
