use std::marker::PhantomData;
use std::sync::Arc;

use crate::event_sourcing::core::{encode_event, Aggregate, ExpectedVersion, StorageError};
use crate::event_sourcing::store::{AppendResult, EventLog};
use crate::metrics::Metrics;

// ============================================================================
// Optimistic Appender
// ============================================================================
//
// Encodes events in caller order and hands them to the log's conditional
// append. A version mismatch comes back as `AppendOutcome::Conflict`; the
// caller re-reads and retries the whole business operation.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Applied {
        new_revision: u64,
    },
    Conflict {
        expected: ExpectedVersion,
        actual: Option<u64>,
    },
}

impl AppendOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, AppendOutcome::Applied { .. })
    }

    /// Host-facing version after a successful append
    pub fn new_version(&self) -> Option<i64> {
        match self {
            AppendOutcome::Applied { new_revision } => Some(*new_revision as i64),
            AppendOutcome::Conflict { .. } => None,
        }
    }
}

pub struct OptimisticAppender<A: Aggregate> {
    log: Arc<dyn EventLog>,
    metrics: Arc<Metrics>,
    _phantom: PhantomData<fn() -> A>,
}

impl<A: Aggregate> OptimisticAppender<A> {
    pub fn new(log: Arc<dyn EventLog>, metrics: Arc<Metrics>) -> Self {
        Self {
            log,
            metrics,
            _phantom: PhantomData,
        }
    }

    pub async fn append(
        &self,
        id: &str,
        events: &[A::Event],
        expected: ExpectedVersion,
    ) -> Result<AppendOutcome, StorageError> {
        if events.is_empty() {
            return Err(StorageError::InvalidArgument(
                "cannot append an empty event list".to_string(),
            ));
        }

        let records = events
            .iter()
            .map(encode_event)
            .collect::<Result<Vec<_>, _>>()?;

        match self.log.append_conditional(id, expected, records).await? {
            AppendResult::Appended { new_revision } => {
                let computed = expected.revision_after(events.len());
                if computed != new_revision {
                    tracing::warn!(
                        aggregate_id = %id,
                        expected = %expected,
                        computed,
                        new_revision,
                        "Log reported a different revision than expected + count, trusting the log"
                    );
                }

                self.metrics.record_append(A::TYPE_TAG, events.len());
                tracing::info!(
                    aggregate_id = %id,
                    aggregate_type = A::TYPE_TAG,
                    new_revision,
                    event_count = events.len(),
                    "✅ Appended events to log"
                );

                Ok(AppendOutcome::Applied { new_revision })
            }
            AppendResult::Conflict { actual } => {
                self.metrics.record_conflict(A::TYPE_TAG);
                tracing::warn!(
                    aggregate_id = %id,
                    aggregate_type = A::TYPE_TAG,
                    expected = %expected,
                    actual = ?actual,
                    "Concurrency conflict, append rejected"
                );

                Ok(AppendOutcome::Conflict { expected, actual })
            }
        }
    }
}
