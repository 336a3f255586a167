use crate::utils::IsTransient;

// ============================================================================
// Storage Errors
// ============================================================================
//
// Conflicts are NOT errors: a version mismatch on append is returned as a
// value (see `AppendOutcome`). Everything here is either retryable
// (`Unavailable`) or means the aggregate cannot be rebuilt or written safely.
//
// ============================================================================

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{backend} unavailable: {source}")]
    Unavailable {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("unknown event type `{type_tag}` at revision {revision} of stream {stream_id}")]
    UnknownEventType {
        stream_id: String,
        revision: u64,
        type_tag: String,
    },

    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {context}: {source}")]
    Encode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StorageError {
    pub fn unavailable(backend: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Unavailable {
            backend,
            source: source.into(),
        }
    }

    pub fn encode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Encode {
            context: context.into(),
            source,
        }
    }

    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }
}

impl IsTransient for StorageError {
    fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_transient() {
        let unavailable = StorageError::unavailable("event log", "connection reset");
        assert!(unavailable.is_transient());

        let unknown = StorageError::UnknownEventType {
            stream_id: "S1".to_string(),
            revision: 3,
            type_tag: "shipment.Lost".to_string(),
        };
        assert!(!unknown.is_transient());

        let invalid = StorageError::InvalidArgument("empty batch".to_string());
        assert!(!invalid.is_transient());
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = StorageError::UnknownEventType {
            stream_id: "S1".to_string(),
            revision: 3,
            type_tag: "shipment.Lost".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown event type `shipment.Lost` at revision 3 of stream S1"
        );

        let err = StorageError::unavailable("blob store", "timed out");
        assert_eq!(err.to_string(), "blob store unavailable: timed out");

        let source = serde_json::from_str::<u8>("300").unwrap_err();
        let err = StorageError::encode("snapshot snapshots/ShipmentState.S1", source);
        assert!(err.to_string().starts_with("failed to encode snapshot snapshots/ShipmentState.S1"));
        assert!(!err.is_transient());
    }
}
