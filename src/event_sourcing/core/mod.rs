// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// GENERIC, reusable building blocks that work with ANY journaled aggregate:
// versions, wire records, the event registry and the error type.
//
// Key Principles:
// - No domain-specific code (no Shipment, etc.)
// - Generic over aggregate types
//
// ============================================================================

pub mod aggregate;
pub mod error;
pub mod event;
pub mod version;

// Re-export core types for convenience
pub use aggregate::Aggregate;
pub use error::{BoxError, StorageError};
pub use event::{
    deserialize_event, encode_event, serialize_event, DomainEvent, EventRecord, EventRegistry,
    EventVariant, RecordedEvent,
};
pub use version::{stream_length, version_of, ExpectedVersion, NO_STREAM_VERSION};
