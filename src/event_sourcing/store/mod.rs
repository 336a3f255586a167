// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// Collaborator interfaces (event log, blob store) with in-memory, ScyllaDB
// and filesystem implementations, plus the snapshot facade on top of blobs.
//
// ============================================================================

pub mod blob;
pub mod log;
pub mod memory_log;
pub mod scylla_log;
pub mod snapshot_store;

pub use blob::{BlobStore, FsBlobStore, InMemoryBlobStore};
pub use log::{AppendResult, EventLog, EventStream};
pub use memory_log::{InMemoryEventLog, LogCallCounts};
pub use scylla_log::ScyllaEventLog;
pub use snapshot_store::{SnapshotStore, DEFAULT_SNAPSHOT_CONTAINER};
