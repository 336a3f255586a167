use std::sync::Arc;

use super::context::BackgroundTasks;
use crate::config::CompactionMode;
use crate::event_sourcing::core::Aggregate;
use crate::event_sourcing::store::SnapshotStore;
use crate::metrics::Metrics;

// ============================================================================
// Snapshot Compactor
// ============================================================================
//
// Runs after every successful append. Once the stream is longer than the
// threshold the post-append state is stashed as the new snapshot. Failures
// stop here: they are logged and counted, and the append that triggered them
// has already succeeded.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Stream is still short enough to replay from genesis
    Skipped,
    Written,
    Failed,
    /// Handed to the background task set
    Scheduled,
}

pub struct SnapshotCompactor<A: Aggregate> {
    snapshots: SnapshotStore<A>,
    threshold: u64,
    mode: CompactionMode,
    metrics: Arc<Metrics>,
    background: Arc<BackgroundTasks>,
}

impl<A: Aggregate> SnapshotCompactor<A> {
    pub(crate) fn new(
        snapshots: SnapshotStore<A>,
        threshold: u64,
        mode: CompactionMode,
        metrics: Arc<Metrics>,
        background: Arc<BackgroundTasks>,
    ) -> Self {
        Self {
            snapshots,
            threshold,
            mode,
            metrics,
            background,
        }
    }

    pub fn should_compact(&self, new_stream_length: u64) -> bool {
        new_stream_length > self.threshold
    }

    pub async fn maybe_compact(&self, id: &str, new_stream_length: u64, state: A) -> CompactionOutcome {
        if !self.should_compact(new_stream_length) {
            return CompactionOutcome::Skipped;
        }

        match self.mode {
            CompactionMode::Inline => {
                write_snapshot(&self.snapshots, &self.metrics, id, &state).await
            }
            CompactionMode::Background => {
                let snapshots = self.snapshots.clone();
                let metrics = self.metrics.clone();
                let id = id.to_string();
                self.background
                    .spawn(async move {
                        write_snapshot(&snapshots, &metrics, &id, &state).await;
                    })
                    .await;
                CompactionOutcome::Scheduled
            }
        }
    }
}

async fn write_snapshot<A: Aggregate>(
    snapshots: &SnapshotStore<A>,
    metrics: &Metrics,
    id: &str,
    state: &A,
) -> CompactionOutcome {
    match snapshots.put(id, state).await {
        Ok(()) => {
            metrics.record_snapshot_write(A::TYPE_TAG, "written");
            tracing::debug!(
                aggregate_id = %id,
                aggregate_type = A::TYPE_TAG,
                position = ?state.position(),
                container = snapshots.container(),
                "Stashed snapshot"
            );
            CompactionOutcome::Written
        }
        Err(e) => {
            metrics.record_snapshot_write(A::TYPE_TAG, "failed");
            tracing::warn!(
                aggregate_id = %id,
                aggregate_type = A::TYPE_TAG,
                position = ?state.position(),
                error = %e,
                "Snapshot write failed, next read replays further back"
            );
            CompactionOutcome::Failed
        }
    }
}
