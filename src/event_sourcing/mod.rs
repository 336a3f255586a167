// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic storage for event-sourced aggregates. Domain-specific code is in
// src/domain/
//
//   core    - versions, event encoding, the Aggregate trait, errors
//   store   - event log and blob backends, snapshot store
//   adapter - replayer, appender, compactor and the host-facing façade
//
// ============================================================================

pub mod adapter;
pub mod core;
pub mod store;

pub use self::adapter::*;
pub use self::core::*;
pub use self::store::*;
