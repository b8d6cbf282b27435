// ============================================================================
// Order Domain - sample aggregate on top of the event log
// ============================================================================
//
// - Value objects (OrderItem, OrderStatus)
// - Events (one DomainEvent payload per fact) and their registration
// - Commands (OrderCommand)
// - Errors (OrderError)
// - Aggregate (OrderAggregate)
// - Command Handler (OrderCommandHandler)
//
// ============================================================================

pub mod aggregate;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod value_objects;

pub use aggregate::*;
pub use command_handler::*;
pub use commands::*;
pub use errors::*;
pub use events::*;
pub use value_objects::*;
