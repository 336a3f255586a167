// ============================================================================
// Aggregate Adapter - Host-facing Façade
// ============================================================================
//
// Bridges one in-memory aggregate type and the durable backends:
//
//   read:  adapter -> replayer -> (snapshot store, log) -> (version, state)
//   write: adapter -> appender -> log (conditional) -> compactor -> snapshots
//
// The host (an actor holding one authoritative instance per id) calls
// `read_state` on activation and `apply_updates` for every batch of new
// events.
//
// ============================================================================

mod appender;
mod compactor;
mod context;
mod replayer;

pub use appender::{AppendOutcome, OptimisticAppender};
pub use compactor::{CompactionOutcome, SnapshotCompactor};
pub use context::StorageContext;
pub use replayer::EventReplayer;

use std::sync::Arc;

use crate::event_sourcing::core::{
    stream_length, Aggregate, EventRegistry, ExpectedVersion, StorageError, NO_STREAM_VERSION,
};
use crate::event_sourcing::store::SnapshotStore;

pub struct AggregateAdapter<A: Aggregate> {
    context: Arc<StorageContext>,
    replayer: EventReplayer<A>,
    appender: OptimisticAppender<A>,
    compactor: SnapshotCompactor<A>,
}

impl<A: Aggregate> AggregateAdapter<A> {
    /// Adapter using the aggregate's own event registry
    pub fn new(context: Arc<StorageContext>) -> Self {
        Self::with_registry(context, A::event_registry())
    }

    pub fn with_registry(context: Arc<StorageContext>, registry: EventRegistry<A::Event>) -> Self {
        if registry.is_empty() {
            tracing::warn!(
                aggregate_type = A::TYPE_TAG,
                "Event registry is empty, any non-empty stream will fail to replay"
            );
        } else {
            tracing::debug!(aggregate_type = A::TYPE_TAG, event_types = registry.len(), ?registry, "Adapter ready");
        }

        let config = context.config();
        let snapshots =
            SnapshotStore::<A>::new(context.blobs().clone(), config.snapshot_container.clone());

        let replayer = EventReplayer::new(
            context.log().clone(),
            snapshots.clone(),
            Arc::new(registry),
            config.snapshot_threshold,
            context.metrics().clone(),
        );
        let appender = OptimisticAppender::new(context.log().clone(), context.metrics().clone());
        let compactor = SnapshotCompactor::new(
            snapshots,
            config.snapshot_threshold,
            config.compaction,
            context.metrics().clone(),
            context.background().clone(),
        );

        Self {
            context,
            replayer,
            appender,
            compactor,
        }
    }

    pub fn context(&self) -> &Arc<StorageContext> {
        &self.context
    }

    /// Current `(version, state)`; `(-1, default)` for an unset id or a stream
    /// that has never been written
    pub async fn read_state(&self, id: Option<&str>) -> Result<(i64, A), StorageError> {
        match id {
            None => Ok((NO_STREAM_VERSION, A::default())),
            Some(id) => self.replayer.replay(id).await,
        }
    }

    /// Commit `events` if the stream is still at `expected_version`
    ///
    /// Returns `Ok(false)` on a version conflict; the caller must re-read and
    /// retry. `state` is the caller's state at `expected_version` and seeds
    /// the snapshot written after the append.
    pub async fn apply_updates(
        &self,
        events: &[A::Event],
        expected_version: i64,
        id: Option<&str>,
        state: &A,
    ) -> Result<bool, StorageError> {
        let id = id.ok_or_else(|| {
            StorageError::InvalidArgument("cannot apply updates without an aggregate id".to_string())
        })?;
        let expected = ExpectedVersion::from_version(expected_version)?;

        let outcome = self.commit(id, events, expected, state).await?;
        Ok(outcome.is_applied())
    }

    /// Append and compact, reporting the log's new revision on success
    pub async fn commit(
        &self,
        id: &str,
        events: &[A::Event],
        expected: ExpectedVersion,
        state: &A,
    ) -> Result<AppendOutcome, StorageError> {
        let outcome = self.appender.append(id, events, expected).await?;

        if let AppendOutcome::Applied { new_revision } = outcome {
            let new_length = stream_length(Some(new_revision));
            if self.compactor.should_compact(new_length) {
                self.compact_after_append(id, events, expected, new_revision, state)
                    .await;
            }
        }

        Ok(outcome)
    }

    async fn compact_after_append(
        &self,
        id: &str,
        events: &[A::Event],
        expected: ExpectedVersion,
        new_revision: u64,
        state: &A,
    ) -> CompactionOutcome {
        if state.version() != expected.as_version() {
            // The snapshot would claim a position its contents do not match
            tracing::warn!(
                aggregate_id = %id,
                aggregate_type = A::TYPE_TAG,
                state_version = state.version(),
                expected = %expected,
                "State does not match expected version, skipping snapshot"
            );
            return CompactionOutcome::Skipped;
        }

        let mut next = state.clone();
        next.apply_all(events);
        next.set_position(Some(new_revision));

        self.compactor
            .maybe_compact(id, stream_length(Some(new_revision)), next)
            .await
    }
}
