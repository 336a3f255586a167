use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Instant;

use crate::event_sourcing::core::{stream_length, Aggregate, EventRegistry, StorageError};
use crate::event_sourcing::store::{EventLog, SnapshotStore};
use crate::metrics::Metrics;

// ============================================================================
// Event Replayer
// ============================================================================
//
// Rebuilds (version, state) from an optional snapshot plus the events after
// it. A fresh state object is built on every call, and nothing is returned
// unless every event resolved and applied, so callers never see partial
// state.
//
// ============================================================================

pub struct EventReplayer<A: Aggregate> {
    log: Arc<dyn EventLog>,
    snapshots: SnapshotStore<A>,
    registry: Arc<EventRegistry<A::Event>>,
    snapshot_threshold: u64,
    metrics: Arc<Metrics>,
}

impl<A: Aggregate> EventReplayer<A> {
    pub fn new(
        log: Arc<dyn EventLog>,
        snapshots: SnapshotStore<A>,
        registry: Arc<EventRegistry<A::Event>>,
        snapshot_threshold: u64,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            log,
            snapshots,
            registry,
            snapshot_threshold,
            metrics,
        }
    }

    pub async fn replay(&self, id: &str) -> Result<(i64, A), StorageError> {
        let started = Instant::now();
        let revision = self.log.stream_revision(id).await?;

        let (mut state, from_snapshot) = if stream_length(revision) > self.snapshot_threshold {
            self.load_snapshot(id, revision).await?
        } else {
            (A::default(), false)
        };

        let from = state.position().map(|p| p + 1).unwrap_or(0);
        let Some(mut events) = self.log.read_forward(id, from).await? else {
            tracing::debug!(aggregate_id = %id, "No stream yet, returning fresh state");
            return Ok((state.version(), state));
        };

        let mut replayed = 0u64;
        while let Some(record) = events.next().await {
            let record = record?;
            let event = self.registry.decode(&record)?;
            state.apply_event(&event);
            state.set_position(Some(record.revision));
            replayed += 1;
        }

        let elapsed = started.elapsed();
        self.metrics
            .record_replay(A::TYPE_TAG, from_snapshot, replayed, elapsed.as_secs_f64());

        tracing::debug!(
            aggregate_id = %id,
            aggregate_type = A::TYPE_TAG,
            from_revision = from,
            from_snapshot,
            replayed,
            version = state.version(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Replayed aggregate"
        );

        Ok((state.version(), state))
    }

    /// Snapshot to start from, or the default state when none is usable
    async fn load_snapshot(&self, id: &str, revision: Option<u64>) -> Result<(A, bool), StorageError> {
        let Some(snapshot) = self.snapshots.get(id).await? else {
            tracing::debug!(aggregate_id = %id, "No snapshot stashed, replaying from genesis");
            return Ok((A::default(), false));
        };

        match (snapshot.position(), revision) {
            (Some(position), Some(head)) if position <= head => Ok((snapshot, true)),
            (position, head) => {
                tracing::warn!(
                    aggregate_id = %id,
                    aggregate_type = A::TYPE_TAG,
                    snapshot_position = ?position,
                    stream_revision = ?head,
                    "Ignoring snapshot that does not line up with the log"
                );
                Ok((A::default(), false))
            }
        }
    }
}
