use std::fmt;

use super::error::StorageError;

// ============================================================================
// Stream Versions
// ============================================================================
//
// A version is the revision of the last event applied to a stream, counted
// from zero. The host-facing API speaks plain `i64` with `-1` meaning "no
// stream yet"; internally the expected version is an explicit enum so the
// two cases cannot be confused.
//
// ============================================================================

/// Version reported for an aggregate whose stream does not exist yet
pub const NO_STREAM_VERSION: i64 = -1;

/// Concurrency token for a conditional append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The stream must not exist
    NoStream,
    /// The stream's last revision must be exactly this value
    Exact(u64),
}

impl ExpectedVersion {
    /// Convert a host-facing version (`-1` or a revision) into an expected version
    pub fn from_version(version: i64) -> Result<Self, StorageError> {
        match version {
            NO_STREAM_VERSION => Ok(Self::NoStream),
            v if v >= 0 => Ok(Self::Exact(v as u64)),
            v => Err(StorageError::InvalidArgument(format!(
                "expected version must be {} or a revision >= 0, got {}",
                NO_STREAM_VERSION, v
            ))),
        }
    }

    /// Host-facing representation (`-1` for no stream)
    pub fn as_version(&self) -> i64 {
        match self {
            Self::NoStream => NO_STREAM_VERSION,
            Self::Exact(revision) => *revision as i64,
        }
    }

    /// Whether a stream currently at `actual` satisfies this expectation
    pub fn matches(&self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (Self::NoStream, None) => true,
            (Self::Exact(expected), Some(actual)) => *expected == actual,
            _ => false,
        }
    }

    /// Revision the stream will have after appending `count` events
    pub fn revision_after(&self, count: usize) -> u64 {
        match self {
            Self::NoStream => count.saturating_sub(1) as u64,
            Self::Exact(revision) => revision + count as u64,
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStream => write!(f, "no stream"),
            Self::Exact(revision) => write!(f, "revision {}", revision),
        }
    }
}

/// Host-facing version for an optional stream revision
pub fn version_of(revision: Option<u64>) -> i64 {
    revision.map(|r| r as i64).unwrap_or(NO_STREAM_VERSION)
}

/// Number of events in a stream whose last revision is `revision`
pub fn stream_length(revision: Option<u64>) -> u64 {
    revision.map(|r| r + 1).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_version_from_host_version() {
        assert_eq!(ExpectedVersion::from_version(-1).unwrap(), ExpectedVersion::NoStream);
        assert_eq!(ExpectedVersion::from_version(0).unwrap(), ExpectedVersion::Exact(0));
        assert_eq!(ExpectedVersion::from_version(41).unwrap(), ExpectedVersion::Exact(41));
        assert!(matches!(
            ExpectedVersion::from_version(-2),
            Err(StorageError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_expected_version_matches() {
        assert!(ExpectedVersion::NoStream.matches(None));
        assert!(!ExpectedVersion::NoStream.matches(Some(0)));
        assert!(ExpectedVersion::Exact(3).matches(Some(3)));
        assert!(!ExpectedVersion::Exact(3).matches(Some(4)));
        assert!(!ExpectedVersion::Exact(0).matches(None));
    }

    #[test]
    fn test_revision_after_append() {
        // First append of one event lands at revision 0
        assert_eq!(ExpectedVersion::NoStream.revision_after(1), 0);
        assert_eq!(ExpectedVersion::NoStream.revision_after(3), 2);
        assert_eq!(ExpectedVersion::Exact(0).revision_after(1), 1);
        assert_eq!(ExpectedVersion::Exact(5).revision_after(3), 8);
    }

    #[test]
    fn test_stream_length_and_version() {
        assert_eq!(stream_length(None), 0);
        assert_eq!(stream_length(Some(0)), 1);
        assert_eq!(version_of(None), NO_STREAM_VERSION);
        assert_eq!(version_of(Some(7)), 7);
    }
}
