// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Domain-specific aggregates. Each aggregate has its own subdirectory with:
// - Value objects
// - Events
// - Commands
// - Errors
// - Aggregate implementation
//
// This layer only depends on the core traits in `event_sourcing::core`; the
// storage adapter never needs to know which aggregate it is rebuilding.
//
// ============================================================================

pub mod shipment;
