// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Domain-specific aggregates built on the generic event sourcing layer.
// Each aggregate has its own subdirectory with value objects, events,
// commands, errors, the aggregate and its command handler.
//
// ============================================================================

pub mod order;
