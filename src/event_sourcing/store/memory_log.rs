use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

use super::log::{AppendResult, EventLog, EventStream};
use crate::event_sourcing::core::{EventRecord, ExpectedVersion, RecordedEvent, StorageError};

// ============================================================================
// In-Memory Event Log
// ============================================================================
//
// Process-local log for tests and demos. The compare-and-append runs under a
// single write lock, so it has the same one-winner semantics as a real log.
// Call counters let tests assert on how the adapter used the log.
//
// ============================================================================

#[derive(Default)]
pub struct InMemoryEventLog {
    streams: RwLock<HashMap<String, Vec<RecordedEvent>>>,
    unavailable: AtomicBool,
    stats: LogCallStats,
    reads: Mutex<Vec<(String, u64)>>,
}

#[derive(Default)]
struct LogCallStats {
    revision_calls: AtomicU64,
    read_calls: AtomicU64,
    append_calls: AtomicU64,
    events_served: AtomicU64,
}

/// Snapshot of the call counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogCallCounts {
    pub revision_calls: u64,
    pub read_calls: u64,
    pub append_calls: u64,
    pub events_served: u64,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Unavailable` until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn call_counts(&self) -> LogCallCounts {
        LogCallCounts {
            revision_calls: self.stats.revision_calls.load(Ordering::SeqCst),
            read_calls: self.stats.read_calls.load(Ordering::SeqCst),
            append_calls: self.stats.append_calls.load(Ordering::SeqCst),
            events_served: self.stats.events_served.load(Ordering::SeqCst),
        }
    }

    pub fn reset_call_counts(&self) {
        self.stats.revision_calls.store(0, Ordering::SeqCst);
        self.stats.read_calls.store(0, Ordering::SeqCst);
        self.stats.append_calls.store(0, Ordering::SeqCst);
        self.stats.events_served.store(0, Ordering::SeqCst);
    }

    /// `(stream_id, from)` of every forward read, oldest first
    pub async fn forward_reads(&self) -> Vec<(String, u64)> {
        self.reads.lock().await.clone()
    }

    /// Copy of a stream's contents
    pub async fn events(&self, stream_id: &str) -> Vec<RecordedEvent> {
        self.streams
            .read()
            .await
            .get(stream_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Store a raw record at the end of a stream, bypassing the version check
    pub async fn push_raw(&self, stream_id: &str, type_tag: &str, payload: &[u8]) -> u64 {
        let mut streams = self.streams.write().await;
        let stream = streams.entry(stream_id.to_string()).or_default();
        let revision = stream.len() as u64;
        stream.push(RecordedEvent {
            stream_id: stream_id.to_string(),
            revision,
            event_id: uuid::Uuid::new_v4(),
            type_tag: type_tag.to_string(),
            payload: payload.to_vec(),
            recorded_at: Utc::now(),
        });
        revision
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "event log",
                "in-memory log marked unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn stream_revision(&self, stream_id: &str) -> Result<Option<u64>, StorageError> {
        self.stats.revision_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let streams = self.streams.read().await;
        Ok(streams
            .get(stream_id)
            .and_then(|events| events.last())
            .map(|e| e.revision))
    }

    async fn read_forward(
        &self,
        stream_id: &str,
        from: u64,
    ) -> Result<Option<EventStream>, StorageError> {
        self.stats.read_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.reads.lock().await.push((stream_id.to_string(), from));

        let streams = self.streams.read().await;
        let Some(events) = streams.get(stream_id) else {
            return Ok(None);
        };

        let batch: Vec<_> = events
            .iter()
            .filter(|e| e.revision >= from)
            .cloned()
            .map(Ok)
            .collect();
        self.stats
            .events_served
            .fetch_add(batch.len() as u64, Ordering::SeqCst);

        Ok(Some(Box::pin(stream::iter(batch))))
    }

    async fn append_conditional(
        &self,
        stream_id: &str,
        expected: ExpectedVersion,
        records: Vec<EventRecord>,
    ) -> Result<AppendResult, StorageError> {
        self.stats.append_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut streams = self.streams.write().await;
        let actual = streams
            .get(stream_id)
            .and_then(|events| events.last())
            .map(|e| e.revision);

        if !expected.matches(actual) {
            return Ok(AppendResult::Conflict { actual });
        }
        if records.is_empty() {
            return Err(StorageError::InvalidArgument(
                "cannot append an empty batch".to_string(),
            ));
        }

        let stream = streams.entry(stream_id.to_string()).or_default();
        let now = Utc::now();
        for record in records {
            let revision = stream.len() as u64;
            stream.push(RecordedEvent {
                stream_id: stream_id.to_string(),
                revision,
                event_id: record.event_id,
                type_tag: record.type_tag,
                payload: record.payload,
                recorded_at: now,
            });
        }

        let new_revision = stream.len() as u64 - 1;
        Ok(AppendResult::Appended { new_revision })
    }
}
