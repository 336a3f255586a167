use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::batch::Batch;
use scylla::value::{CqlValue, Row};
use std::sync::Arc;
use uuid::Uuid;

use super::log::{AppendResult, EventLog, EventStream};
use crate::event_sourcing::core::{EventRecord, ExpectedVersion, RecordedEvent, StorageError};

// ============================================================================
// ScyllaDB Event Log
// ============================================================================
//
// One partition per stream. The static `head` column holds the revision of
// the last event and is the compare-and-set target: an append is a single
// partition LWT batch that moves `head` and inserts the new rows, so either
// every record lands or none does.
//
// Schema:
//   event_log (stream_id text, revision bigint, head bigint static,
//              event_id uuid, event_type text, payload blob,
//              recorded_at timestamp,
//              PRIMARY KEY (stream_id, revision))
//
// ============================================================================

const BACKEND: &str = "scylla event log";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS event_log (
        stream_id text,
        revision bigint,
        head bigint static,
        event_id uuid,
        event_type text,
        payload blob,
        recorded_at timestamp,
        PRIMARY KEY (stream_id, revision)
    ) WITH CLUSTERING ORDER BY (revision ASC)";

const SELECT_HEAD: &str = "SELECT head FROM event_log WHERE stream_id = ? LIMIT 1";

const SELECT_FORWARD: &str = "SELECT revision, event_id, event_type, payload, recorded_at
     FROM event_log
     WHERE stream_id = ? AND revision >= ?";

const CLAIM_NEW_STREAM: &str = "UPDATE event_log SET head = ? WHERE stream_id = ? IF head = null";

const ADVANCE_HEAD: &str = "UPDATE event_log SET head = ? WHERE stream_id = ? IF head = ?";

const INSERT_EVENT: &str = "INSERT INTO event_log (
        stream_id, revision, event_id, event_type, payload, recorded_at
    ) VALUES (?, ?, ?, ?, ?, ?)";

type ForwardRow = (i64, Uuid, String, Vec<u8>, DateTime<Utc>);

pub struct ScyllaEventLog {
    session: Arc<Session>,
}

impl ScyllaEventLog {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Connect, make sure keyspace and table exist, and switch to the keyspace
    pub async fn connect(node: &str, keyspace: &str) -> Result<Self, StorageError> {
        tracing::info!(node = %node, keyspace = %keyspace, "Connecting to ScyllaDB");

        let session: Session = SessionBuilder::new()
            .known_node(node)
            .build()
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                &[],
            )
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        session
            .use_keyspace(keyspace, false)
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        session
            .query_unpaged(CREATE_TABLE, &[])
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        Ok(Self::new(Arc::new(session)))
    }
}

fn to_revision(value: i64) -> Result<u64, StorageError> {
    u64::try_from(value).map_err(|_| {
        StorageError::unavailable(BACKEND, format!("negative revision {} in event_log", value))
    })
}

/// `[applied]` is always the first column of an LWT result
fn lwt_applied(row: &Row) -> bool {
    matches!(row.columns.first(), Some(Some(CqlValue::Boolean(true))))
}

#[async_trait]
impl EventLog for ScyllaEventLog {
    async fn stream_revision(&self, stream_id: &str) -> Result<Option<u64>, StorageError> {
        let result = self
            .session
            .query_unpaged(SELECT_HEAD, (stream_id,))
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None), // No rows = new stream
        };

        match rows_result
            .maybe_first_row::<(Option<i64>,)>()
            .map_err(|e| StorageError::unavailable(BACKEND, e))?
        {
            Some((Some(head),)) => Ok(Some(to_revision(head)?)),
            _ => Ok(None),
        }
    }

    async fn read_forward(
        &self,
        stream_id: &str,
        from: u64,
    ) -> Result<Option<EventStream>, StorageError> {
        if self.stream_revision(stream_id).await?.is_none() {
            return Ok(None);
        }

        let rows = self
            .session
            .query_iter(SELECT_FORWARD, (stream_id, from as i64))
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?
            .rows_stream::<ForwardRow>()
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        let stream_id = stream_id.to_string();
        let events = rows.map(move |row| {
            let (revision, event_id, type_tag, payload, recorded_at) =
                row.map_err(|e| StorageError::unavailable(BACKEND, e))?;

            tracing::trace!(stream_id = %stream_id, revision, type_tag = %type_tag, "Read event");

            Ok(RecordedEvent {
                stream_id: stream_id.clone(),
                revision: to_revision(revision)?,
                event_id,
                type_tag,
                payload,
                recorded_at,
            })
        });

        Ok(Some(Box::pin(events)))
    }

    async fn append_conditional(
        &self,
        stream_id: &str,
        expected: ExpectedVersion,
        records: Vec<EventRecord>,
    ) -> Result<AppendResult, StorageError> {
        if records.is_empty() {
            return Err(StorageError::InvalidArgument(
                "cannot append an empty batch".to_string(),
            ));
        }

        let new_revision = expected.revision_after(records.len());
        let first_revision = match expected {
            ExpectedVersion::NoStream => 0,
            ExpectedVersion::Exact(revision) => revision + 1,
        };

        // Prepare single-partition conditional batch
        let mut batch = Batch::default();
        let mut values: Vec<Box<dyn scylla::serialize::row::SerializeRow + Send + Sync>> = vec![];

        match expected {
            ExpectedVersion::NoStream => {
                batch.append_statement(CLAIM_NEW_STREAM);
                values.push(Box::new((new_revision as i64, stream_id.to_string())));
            }
            ExpectedVersion::Exact(revision) => {
                batch.append_statement(ADVANCE_HEAD);
                values.push(Box::new((
                    new_revision as i64,
                    stream_id.to_string(),
                    revision as i64,
                )));
            }
        }

        let now = Utc::now();
        for (offset, record) in records.into_iter().enumerate() {
            batch.append_statement(INSERT_EVENT);
            values.push(Box::new((
                stream_id.to_string(),
                (first_revision + offset as u64) as i64,
                record.event_id,
                record.type_tag,
                record.payload,
                now,
            )));
        }

        let result = self
            .session
            .batch(&batch, values)
            .await
            .map_err(|e| StorageError::unavailable(BACKEND, e))?;

        let applied = result
            .into_rows_result()
            .map_err(|e| StorageError::unavailable(BACKEND, e))?
            .maybe_first_row::<Row>()
            .map_err(|e| StorageError::unavailable(BACKEND, e))?
            .map(|row| lwt_applied(&row))
            .unwrap_or(false);

        if !applied {
            let actual = self.stream_revision(stream_id).await?;
            tracing::debug!(
                stream_id = %stream_id,
                expected = %expected,
                actual = ?actual,
                "Conditional append not applied"
            );
            return Ok(AppendResult::Conflict { actual });
        }

        Ok(AppendResult::Appended { new_revision })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lwt_applied_reads_first_column() {
        let applied = Row {
            columns: vec![Some(CqlValue::Boolean(true))],
        };
        let rejected = Row {
            columns: vec![Some(CqlValue::Boolean(false)), Some(CqlValue::BigInt(3))],
        };
        let empty = Row { columns: vec![] };

        assert!(lwt_applied(&applied));
        assert!(!lwt_applied(&rejected));
        assert!(!lwt_applied(&empty));
    }

    #[test]
    fn test_negative_revision_is_rejected() {
        assert_eq!(to_revision(4).unwrap(), 4);
        assert!(to_revision(-1).is_err());
    }

    // Appends and reads against a live cluster are exercised by the demo
    // binary (`AGGREGATE_STORE_BACKEND=scylla`); unit tests cover the pieces
    // that do not need a session.
}
