// ============================================================================
// aggregate_store
// ============================================================================
//
// Event-sourced storage for actor-hosted aggregates: state is rebuilt from an
// append-only log, writes are guarded by optimistic concurrency, and long
// streams are shortcut by snapshots kept in a blob store.
//
// ============================================================================

pub mod actors;
pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod utils;
