use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::event_sourcing::core::{EventRecord, ExpectedVersion, RecordedEvent, StorageError};

// ============================================================================
// Event Log Collaborator
// ============================================================================
//
// Append-only, per-aggregate streams with a compare-and-append primitive.
// Exactly one append per expected version can win; every other writer gets
// `AppendResult::Conflict` back as a value.
//
// ============================================================================

/// Forward cursor over one stream; finite, and restartable by reading again
pub type EventStream = BoxStream<'static, Result<RecordedEvent, StorageError>>;

/// Outcome of a conditional append as reported by the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    Appended { new_revision: u64 },
    Conflict { actual: Option<u64> },
}

#[async_trait]
pub trait EventLog: Send + Sync {
    /// Revision of the last event in the stream, `None` if it does not exist
    async fn stream_revision(&self, stream_id: &str) -> Result<Option<u64>, StorageError>;

    /// Events with revision >= `from`, in order; `None` if the stream does not exist
    async fn read_forward(
        &self,
        stream_id: &str,
        from: u64,
    ) -> Result<Option<EventStream>, StorageError>;

    /// Append `records` only if the stream is at `expected`
    async fn append_conditional(
        &self,
        stream_id: &str,
        expected: ExpectedVersion,
        records: Vec<EventRecord>,
    ) -> Result<AppendResult, StorageError>;
}
