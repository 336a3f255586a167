use serde::{de::DeserializeOwned, Serialize};

use super::event::{DomainEvent, EventRegistry};
use super::version::version_of;

// ============================================================================
// Aggregate State - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (never written directly)
// 2. Commands are validated before emitting events
// 3. Events represent facts that have already happened
// 4. The state records the revision of the last event folded into it, so a
//    serialized state doubles as a snapshot
//
// ============================================================================

/// Generic Aggregate trait - all journaled aggregates implement this
///
/// Type Parameters:
/// - `Event`: The event union for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Event: DomainEvent;
    type Command;
    type Error;

    /// Type tag used to namespace snapshots of this aggregate
    const TYPE_TAG: &'static str;

    /// Every event type this aggregate may find in its stream
    fn event_registry() -> EventRegistry<Self::Event>;

    /// Fold one event into the state
    fn apply_event(&mut self, event: &Self::Event);

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Revision of the last applied event, `None` for a fresh state
    fn position(&self) -> Option<u64>;

    fn set_position(&mut self, position: Option<u64>);

    /// Host-facing version (`-1` for a fresh state)
    fn version(&self) -> i64 {
        version_of(self.position())
    }

    /// Apply a batch of events in order without touching the position
    fn apply_all<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a Self::Event>,
    {
        for event in events {
            self.apply_event(event);
        }
    }
}
