use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use super::error::StorageError;

// ============================================================================
// Event Wire Records
// ============================================================================
//
// An event travels to the log as a type tag plus a JSON payload. There is no
// schema-version envelope: the type tag alone selects the decoder on replay.
//
// ============================================================================

/// Event as submitted to the log
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub event_id: Uuid,
    pub type_tag: String,
    pub payload: Vec<u8>,
}

/// Event as stored in the log, with its position in the stream
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub stream_id: String,
    pub revision: u64,
    pub event_id: Uuid,
    pub type_tag: String,
    pub payload: Vec<u8>,
    pub recorded_at: DateTime<Utc>,
}

// ============================================================================
// Domain Event Traits
// ============================================================================

/// Event union for one aggregate type (usually an enum with one case per variant)
pub trait DomainEvent: Clone + Send + Sync + 'static {
    /// Declared type tag of this particular event
    fn type_tag(&self) -> &'static str;

    /// JSON body of this event, without the tag
    fn to_payload(&self) -> serde_json::Result<Vec<u8>>;
}

/// A single concrete event type that belongs to the union `Self::Event`
pub trait EventVariant: Serialize + DeserializeOwned + Into<Self::Event> {
    type Event: DomainEvent;

    const TYPE_TAG: &'static str;
}

/// Encode an event for appending to the log
pub fn encode_event<E: DomainEvent>(event: &E) -> Result<EventRecord, StorageError> {
    let payload = event
        .to_payload()
        .map_err(|e| StorageError::encode(format!("event {}", event.type_tag()), e))?;

    Ok(EventRecord {
        event_id: Uuid::new_v4(),
        type_tag: event.type_tag().to_string(),
        payload,
    })
}

pub fn serialize_event<E: Serialize>(event: &E) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(event)
}

pub fn deserialize_event<E: DeserializeOwned>(payload: &[u8]) -> serde_json::Result<E> {
    serde_json::from_slice(payload)
}

// ============================================================================
// Event Registry
// ============================================================================
//
// Static table of the type tags an aggregate understands. Each registered
// variant contributes one decoder; an unregistered tag is never skipped.
//
// ============================================================================

type Decoder<E> = fn(&[u8]) -> serde_json::Result<E>;

pub struct EventRegistry<E> {
    decoders: HashMap<&'static str, Decoder<E>>,
}

impl<E: DomainEvent> EventRegistry<E> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a variant under its declared type tag
    pub fn register<V>(mut self) -> Self
    where
        V: EventVariant<Event = E>,
    {
        let decoder: Decoder<E> = |payload| deserialize_event::<V>(payload).map(Into::into);
        self.decoders.insert(V::TYPE_TAG, decoder);
        self
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }

    /// Resolve a stored record into its event
    pub fn decode(&self, record: &RecordedEvent) -> Result<E, StorageError> {
        let decoder = self.decoders.get(record.type_tag.as_str()).ok_or_else(|| {
            StorageError::UnknownEventType {
                stream_id: record.stream_id.clone(),
                revision: record.revision,
                type_tag: record.type_tag.clone(),
            }
        })?;

        decoder(&record.payload).map_err(|e| {
            StorageError::decode(
                format!(
                    "{} at revision {} of stream {}",
                    record.type_tag, record.revision, record.stream_id
                ),
                e,
            )
        })
    }
}

impl<E: DomainEvent> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.decoders.keys().collect();
        tags.sort();
        f.debug_struct("EventRegistry").field("type_tags", &tags).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct Opened {
        owner: String,
    }

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct Closed;

    #[derive(Clone, Debug, PartialEq)]
    enum TestEvent {
        Opened(Opened),
        Closed(Closed),
    }

    impl DomainEvent for TestEvent {
        fn type_tag(&self) -> &'static str {
            match self {
                TestEvent::Opened(_) => Opened::TYPE_TAG,
                TestEvent::Closed(_) => Closed::TYPE_TAG,
            }
        }

        fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
            match self {
                TestEvent::Opened(e) => serialize_event(e),
                TestEvent::Closed(e) => serialize_event(e),
            }
        }
    }

    impl From<Opened> for TestEvent {
        fn from(e: Opened) -> Self {
            TestEvent::Opened(e)
        }
    }

    impl From<Closed> for TestEvent {
        fn from(e: Closed) -> Self {
            TestEvent::Closed(e)
        }
    }

    impl EventVariant for Opened {
        type Event = TestEvent;
        const TYPE_TAG: &'static str = "test.Opened";
    }

    impl EventVariant for Closed {
        type Event = TestEvent;
        const TYPE_TAG: &'static str = "test.Closed";
    }

    fn recorded(type_tag: &str, payload: &[u8]) -> RecordedEvent {
        RecordedEvent {
            stream_id: "acc-1".to_string(),
            revision: 4,
            event_id: Uuid::new_v4(),
            type_tag: type_tag.to_string(),
            payload: payload.to_vec(),
            recorded_at: Utc::now(),
        }
    }

    fn registry() -> EventRegistry<TestEvent> {
        EventRegistry::new().register::<Opened>().register::<Closed>()
    }

    #[test]
    fn test_encode_event_uses_declared_tag() {
        let event = TestEvent::Opened(Opened {
            owner: "ada".to_string(),
        });

        let record = encode_event(&event).unwrap();
        assert_eq!(record.type_tag, "test.Opened");
        assert_eq!(record.payload, br#"{"owner":"ada"}"#.to_vec());
    }

    #[derive(Clone)]
    struct Unencodable;

    impl DomainEvent for Unencodable {
        fn type_tag(&self) -> &'static str {
            "test.Unencodable"
        }

        fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
            // JSON object keys must be strings
            let mut body = std::collections::BTreeMap::new();
            body.insert(vec![1u8], 1u8);
            serialize_event(&body)
        }
    }

    #[test]
    fn test_unencodable_event_is_encode_error() {
        let err = encode_event(&Unencodable).unwrap_err();

        assert!(matches!(err, StorageError::Encode { .. }));
        assert!(err.to_string().starts_with("failed to encode event test.Unencodable"));
    }

    #[test]
    fn test_registry_decodes_registered_variant() {
        let registry = registry();
        assert_eq!(registry.len(), 2);

        let event = registry
            .decode(&recorded("test.Opened", br#"{"owner":"ada"}"#))
            .unwrap();
        assert_eq!(
            event,
            TestEvent::Opened(Opened {
                owner: "ada".to_string()
            })
        );
    }

    #[test]
    fn test_registry_rejects_unknown_tag() {
        let err = registry()
            .decode(&recorded("test.Frozen", b"{}"))
            .unwrap_err();

        match err {
            StorageError::UnknownEventType {
                stream_id,
                revision,
                type_tag,
            } => {
                assert_eq!(stream_id, "acc-1");
                assert_eq!(revision, 4);
                assert_eq!(type_tag, "test.Frozen");
            }
            other => panic!("expected UnknownEventType, got {:?}", other),
        }
    }

    #[test]
    fn test_registry_reports_bad_payload_as_decode_error() {
        let err = registry()
            .decode(&recorded("test.Opened", br#"{"owner":42}"#))
            .unwrap_err();
        assert!(matches!(err, StorageError::Decode { .. }));
    }

    #[test]
    fn test_empty_registry_knows_nothing() {
        let registry = EventRegistry::<TestEvent>::new();
        assert!(registry.is_empty());
        assert!(registry.decode(&recorded("test.Opened", b"{}")).is_err());
    }
}
