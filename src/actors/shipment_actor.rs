use actix::prelude::*;
use std::sync::Arc;

use crate::domain::shipment::{ShipmentCommand, ShipmentError, ShipmentState};
use crate::event_sourcing::{Aggregate, AggregateAdapter, AppendOutcome, ExpectedVersion, StorageError};
use crate::utils::{retry_on_transient, RetryConfig};

// ============================================================================
// Actor Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<ShipmentState, ShipmentActorError>")]
pub struct Pickup;

#[derive(Message)]
#[rtype(result = "Result<ShipmentState, ShipmentActorError>")]
pub struct Deliver;

/// Current `(version, state)`, loading it on first use
#[derive(Message)]
#[rtype(result = "Result<(i64, ShipmentState), ShipmentActorError>")]
pub struct GetStatus;

/// Drop the cached state; the next message reloads it from storage
#[derive(Message)]
#[rtype(result = "()")]
pub struct Deactivate;

#[derive(Debug, thiserror::Error)]
pub enum ShipmentActorError {
    #[error("command rejected: {0}")]
    Rejected(#[from] ShipmentError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("gave up after {attempts} version conflicts")]
    ConflictRetriesExhausted { attempts: u32 },
}

type Loaded = (i64, ShipmentState);

// ============================================================================
// Shipment Actor - Single authoritative host for one shipment
// ============================================================================
//
// Holds the in-memory state of one shipment id. Commands run one at a time
// (AtomicResponse), so the cached version is always the one this actor last
// committed. Another writer on the same stream shows up as a conflict; the
// actor then reloads and re-runs the command against the fresh state.
//
// ============================================================================

pub struct ShipmentActor {
    id: String,
    adapter: Arc<AggregateAdapter<ShipmentState>>,
    cached: Option<Loaded>,
    retry: RetryConfig,
    conflict_retries: u32,
}

impl ShipmentActor {
    pub fn new(id: impl Into<String>, adapter: Arc<AggregateAdapter<ShipmentState>>) -> Self {
        let conflict_retries = adapter.context().config().conflict_retries;
        Self {
            id: id.into(),
            adapter,
            cached: None,
            retry: RetryConfig::default(),
            conflict_retries,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_conflict_retries(mut self, conflict_retries: u32) -> Self {
        self.conflict_retries = conflict_retries;
        self
    }

    fn execute(&mut self, command: ShipmentCommand) -> AtomicResponse<Self, Result<ShipmentState, ShipmentActorError>> {
        let adapter = self.adapter.clone();
        let id = self.id.clone();
        let cached = self.cached.take();
        let retry = self.retry.clone();
        let conflict_retries = self.conflict_retries;

        AtomicResponse::new(Box::pin(
            async move {
                run_command(&adapter, &id, cached, command, &retry, conflict_retries).await
            }
            .into_actor(self)
            .map(|(result, cached), actor, _ctx| {
                actor.cached = cached;
                result
            }),
        ))
    }
}

impl Actor for ShipmentActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(shipment_id = %self.id, "ShipmentActor started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(shipment_id = %self.id, "ShipmentActor stopped");
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<Pickup> for ShipmentActor {
    type Result = AtomicResponse<Self, Result<ShipmentState, ShipmentActorError>>;

    fn handle(&mut self, _msg: Pickup, _: &mut Self::Context) -> Self::Result {
        self.execute(ShipmentCommand::Pickup)
    }
}

impl Handler<Deliver> for ShipmentActor {
    type Result = AtomicResponse<Self, Result<ShipmentState, ShipmentActorError>>;

    fn handle(&mut self, _msg: Deliver, _: &mut Self::Context) -> Self::Result {
        self.execute(ShipmentCommand::Deliver)
    }
}

impl Handler<GetStatus> for ShipmentActor {
    type Result = AtomicResponse<Self, Result<Loaded, ShipmentActorError>>;

    fn handle(&mut self, _msg: GetStatus, _: &mut Self::Context) -> Self::Result {
        let adapter = self.adapter.clone();
        let id = self.id.clone();
        let cached = self.cached.take();
        let retry = self.retry.clone();

        AtomicResponse::new(Box::pin(
            async move {
                match cached {
                    Some(loaded) => Ok(loaded),
                    None => load(&adapter, &id, &retry).await,
                }
            }
            .into_actor(self)
            .map(|result, actor, _ctx| {
                if let Ok(loaded) = &result {
                    actor.cached = Some(loaded.clone());
                }
                result
            }),
        ))
    }
}

impl Handler<Deactivate> for ShipmentActor {
    type Result = ();

    fn handle(&mut self, _msg: Deactivate, _: &mut Self::Context) {
        tracing::debug!(shipment_id = %self.id, "Dropping cached state");
        self.cached = None;
    }
}

// ============================================================================
// Command Execution
// ============================================================================

async fn load(
    adapter: &AggregateAdapter<ShipmentState>,
    id: &str,
    retry: &RetryConfig,
) -> Result<Loaded, ShipmentActorError> {
    let loaded = retry_on_transient(retry, |_| adapter.read_state(Some(id))).await?;

    tracing::debug!(shipment_id = %id, version = loaded.0, status = ?loaded.1.status, "Loaded shipment");
    Ok(loaded)
}

/// Returns the command result together with what the actor should cache next
async fn run_command(
    adapter: &AggregateAdapter<ShipmentState>,
    id: &str,
    mut cached: Option<Loaded>,
    command: ShipmentCommand,
    retry: &RetryConfig,
    conflict_retries: u32,
) -> (Result<ShipmentState, ShipmentActorError>, Option<Loaded>) {
    for attempt in 0..=conflict_retries {
        let (version, state) = match cached.take() {
            Some(loaded) => loaded,
            None => match load(adapter, id, retry).await {
                Ok(loaded) => loaded,
                Err(e) => return (Err(e), None),
            },
        };

        let events = match state.handle_command(&command) {
            Ok(events) => events,
            Err(rejected) => {
                tracing::info!(shipment_id = %id, ?command, error = %rejected, "Command rejected");
                return (Err(rejected.into()), Some((version, state)));
            }
        };

        let expected = match ExpectedVersion::from_version(version) {
            Ok(expected) => expected,
            Err(e) => return (Err(e.into()), None),
        };
        let outcome = retry_on_transient(retry, |_| adapter.commit(id, &events, expected, &state)).await;

        match outcome {
            Ok(outcome @ AppendOutcome::Applied { new_revision }) => {
                let new_version = outcome.new_version().unwrap_or(version);
                let mut next = state;
                next.apply_all(&events);
                next.set_position(Some(new_revision));

                tracing::info!(shipment_id = %id, ?command, new_version, status = ?next.status, "Command applied");
                return (Ok(next.clone()), Some((new_version, next)));
            }
            Ok(AppendOutcome::Conflict { actual, .. }) => {
                tracing::warn!(
                    shipment_id = %id,
                    ?command,
                    attempt,
                    stale_version = version,
                    actual = ?actual,
                    "Version conflict, reloading shipment"
                );
            }
            Err(e) => return (Err(e.into()), None),
        }
    }

    (
        Err(ShipmentActorError::ConflictRetriesExhausted {
            attempts: conflict_retries + 1,
        }),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdapterConfig, CompactionMode};
    use crate::domain::shipment::{Delivered, ShipmentEvent, TransitStatus};
    use crate::event_sourcing::{
        AppendResult, EventLog, EventRecord, EventStream, InMemoryBlobStore, InMemoryEventLog,
        StorageContext,
    };
    use futures_util::StreamExt;
    use crate::metrics::Metrics;
    use chrono::Utc;
    use std::time::Duration;

    fn adapter_over(log: &Arc<InMemoryEventLog>) -> Arc<AggregateAdapter<ShipmentState>> {
        let config = AdapterConfig::default()
            .with_snapshot_threshold(1)
            .with_compaction(CompactionMode::Inline);
        let context = StorageContext::new(
            config,
            log.clone(),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(Metrics::new().unwrap()),
        );
        Arc::new(AggregateAdapter::new(Arc::new(context)))
    }

    /// Log whose first revision is `OFFSET` instead of 0
    struct OffsetLog {
        inner: InMemoryEventLog,
    }

    const OFFSET: u64 = 10;

    #[async_trait::async_trait]
    impl EventLog for OffsetLog {
        async fn stream_revision(&self, stream_id: &str) -> Result<Option<u64>, StorageError> {
            Ok(self.inner.stream_revision(stream_id).await?.map(|r| r + OFFSET))
        }

        async fn read_forward(
            &self,
            stream_id: &str,
            from: u64,
        ) -> Result<Option<EventStream>, StorageError> {
            let events = self
                .inner
                .read_forward(stream_id, from.saturating_sub(OFFSET))
                .await?;
            Ok(events.map(|events| {
                events
                    .map(|event| {
                        event.map(|mut event| {
                            event.revision += OFFSET;
                            event
                        })
                    })
                    .boxed()
            }))
        }

        async fn append_conditional(
            &self,
            stream_id: &str,
            expected: ExpectedVersion,
            records: Vec<EventRecord>,
        ) -> Result<AppendResult, StorageError> {
            let expected = match expected {
                ExpectedVersion::NoStream => ExpectedVersion::NoStream,
                ExpectedVersion::Exact(r) if r >= OFFSET => ExpectedVersion::Exact(r - OFFSET),
                ExpectedVersion::Exact(_) => {
                    let actual = self.stream_revision(stream_id).await?;
                    return Ok(AppendResult::Conflict { actual });
                }
            };

            Ok(match self.inner.append_conditional(stream_id, expected, records).await? {
                AppendResult::Appended { new_revision } => AppendResult::Appended {
                    new_revision: new_revision + OFFSET,
                },
                AppendResult::Conflict { actual } => AppendResult::Conflict {
                    actual: actual.map(|r| r + OFFSET),
                },
            })
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[actix::test]
    async fn test_shipment_lifecycle() {
        let log = Arc::new(InMemoryEventLog::new());
        let actor = ShipmentActor::new("S1", adapter_over(&log)).start();

        let (version, state) = actor.send(GetStatus).await.unwrap().unwrap();
        assert_eq!(version, -1);
        assert_eq!(state.status, TransitStatus::AwaitingPickup);

        let state = actor.send(Pickup).await.unwrap().unwrap();
        assert_eq!(state.status, TransitStatus::InTransit);

        let state = actor.send(Deliver).await.unwrap().unwrap();
        assert_eq!(state.status, TransitStatus::Delivered);

        let (version, _) = actor.send(GetStatus).await.unwrap().unwrap();
        assert_eq!(version, 1);
        assert_eq!(log.events("S1").await.len(), 2);

        // Reload from storage gives the same answer
        actor.send(Deactivate).await.unwrap();
        let (version, state) = actor.send(GetStatus).await.unwrap().unwrap();
        assert_eq!(version, 1);
        assert_eq!(state.status, TransitStatus::Delivered);
    }

    #[actix::test]
    async fn test_invalid_transition_is_rejected() {
        let log = Arc::new(InMemoryEventLog::new());
        let actor = ShipmentActor::new("S1", adapter_over(&log)).start();

        let result = actor.send(Deliver).await.unwrap();

        assert!(matches!(
            result,
            Err(ShipmentActorError::Rejected(ShipmentError::NotPickedUp))
        ));
        assert!(log.events("S1").await.is_empty());
    }

    #[actix::test]
    async fn test_conflict_reloads_and_reruns_command() {
        let log = Arc::new(InMemoryEventLog::new());
        let adapter = adapter_over(&log);
        let actor = ShipmentActor::new("S1", adapter.clone()).start();
        actor.send(Pickup).await.unwrap().unwrap();

        // Another host delivers behind this actor's back
        let (version, state) = adapter.read_state(Some("S1")).await.unwrap();
        let delivered: ShipmentEvent = Delivered { at: Utc::now() }.into();
        assert!(adapter
            .apply_updates(&[delivered], version, Some("S1"), &state)
            .await
            .unwrap());

        let result = actor.send(Deliver).await.unwrap();
        assert!(matches!(
            result,
            Err(ShipmentActorError::Rejected(ShipmentError::AlreadyDelivered))
        ));
        assert_eq!(log.events("S1").await.len(), 2);

        let (version, _) = actor.send(GetStatus).await.unwrap().unwrap();
        assert_eq!(version, 1);
    }

    #[actix::test]
    async fn test_unavailable_log_surfaces_after_retries() {
        let log = Arc::new(InMemoryEventLog::new());
        let actor = ShipmentActor::new("S1", adapter_over(&log))
            .with_retry(fast_retry())
            .start();

        log.set_unavailable(true);
        let result = actor.send(Pickup).await.unwrap();
        assert!(matches!(
            result,
            Err(ShipmentActorError::Storage(StorageError::Unavailable { .. }))
        ));
        assert_eq!(log.call_counts().revision_calls, 2);

        log.set_unavailable(false);
        let state = actor.send(Pickup).await.unwrap().unwrap();
        assert_eq!(state.status, TransitStatus::InTransit);
    }

    #[actix::test]
    async fn test_conflict_retries_exhausted() {
        let log = Arc::new(InMemoryEventLog::new());
        let adapter = adapter_over(&log);
        let actor = ShipmentActor::new("S1", adapter.clone())
            .with_conflict_retries(0)
            .start();
        actor.send(GetStatus).await.unwrap().unwrap();

        // Cached version -1 is now stale and no reload is allowed
        log.push_raw("S1", "shipment.PickedUp", br#"{"at":"2024-01-01T00:00:00Z"}"#)
            .await;

        let result = actor.send(Pickup).await.unwrap();
        assert!(matches!(
            result,
            Err(ShipmentActorError::ConflictRetriesExhausted { attempts: 1 })
        ));
    }

    #[actix::test]
    async fn test_cached_version_follows_log_revision() {
        let log = Arc::new(OffsetLog {
            inner: InMemoryEventLog::new(),
        });
        let context = StorageContext::new(
            AdapterConfig::default().with_compaction(CompactionMode::Inline),
            log.clone(),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(Metrics::new().unwrap()),
        );
        let adapter = Arc::new(AggregateAdapter::new(Arc::new(context)));
        let actor = ShipmentActor::new("S1", adapter).start();

        let state = actor.send(Pickup).await.unwrap().unwrap();
        assert_eq!(state.position, Some(OFFSET));
        let (version, _) = actor.send(GetStatus).await.unwrap().unwrap();
        assert_eq!(version, OFFSET as i64);

        // The cached version is usable as the next expected version
        let state = actor.send(Deliver).await.unwrap().unwrap();
        assert_eq!(state.position, Some(OFFSET + 1));

        actor.send(Deactivate).await.unwrap();
        let (version, reloaded) = actor.send(GetStatus).await.unwrap().unwrap();
        assert_eq!(version, OFFSET as i64 + 1);
        assert_eq!(reloaded, state);
    }
}
