use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::event_sourcing::store::DEFAULT_SNAPSHOT_CONTAINER;

// ============================================================================
// Adapter Configuration
// ============================================================================
//
// Defaults come from the constants below; every field can be overridden with
// an `AGGREGATE_STORE_*` environment variable.
//
// ============================================================================

pub const DEFAULT_SNAPSHOT_THRESHOLD: u64 = 1000;
pub const DEFAULT_SCYLLA_NODE: &str = "127.0.0.1:9042";
pub const DEFAULT_KEYSPACE: &str = "journal_ks";
pub const DEFAULT_BLOB_ROOT: &str = ".aggregate-store/blobs";
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;

const ENV_PREFIX: &str = "AGGREGATE_STORE_";

/// When the snapshot write triggered by an append runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionMode {
    /// Awaited before `apply_updates` returns (failures still swallowed)
    Inline,
    /// Spawned onto the storage context's task set
    Background,
}

impl FromStr for CompactionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "background" => Ok(Self::Background),
            other => Err(ConfigError::Invalid {
                key: "COMPACTION",
                value: other.to_string(),
            }),
        }
    }
}

/// Which log/blob backends the storage context connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process log and blobs, nothing survives a restart
    Memory,
    /// ScyllaDB log plus filesystem blobs
    Scylla,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "scylla" => Ok(Self::Scylla),
            other => Err(ConfigError::Invalid {
                key: "BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for AGGREGATE_STORE_{key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Stream length above which reads start from a snapshot and appends write one
    pub snapshot_threshold: u64,
    pub snapshot_container: String,
    pub compaction: CompactionMode,
    pub backend: Backend,
    pub scylla_node: String,
    pub keyspace: String,
    pub blob_root: PathBuf,
    /// Re-read-and-retry attempts the host makes after a conflicting append
    pub conflict_retries: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
            snapshot_container: DEFAULT_SNAPSHOT_CONTAINER.to_string(),
            compaction: CompactionMode::Background,
            backend: Backend::Memory,
            scylla_node: DEFAULT_SCYLLA_NODE.to_string(),
            keyspace: DEFAULT_KEYSPACE.to_string(),
            blob_root: PathBuf::from(DEFAULT_BLOB_ROOT),
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

impl AdapterConfig {
    /// Defaults overridden by `AGGREGATE_STORE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Same as `from_env`, reading variables (without prefix) through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("SNAPSHOT_THRESHOLD") {
            config.snapshot_threshold = parse("SNAPSHOT_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("SNAPSHOT_CONTAINER") {
            config.snapshot_container = value;
        }
        if let Some(value) = lookup("COMPACTION") {
            config.compaction = value.parse()?;
        }
        if let Some(value) = lookup("BACKEND") {
            config.backend = value.parse()?;
        }
        if let Some(value) = lookup("SCYLLA_NODE") {
            config.scylla_node = value;
        }
        if let Some(value) = lookup("KEYSPACE") {
            config.keyspace = value;
        }
        if let Some(value) = lookup("BLOB_ROOT") {
            config.blob_root = PathBuf::from(value);
        }
        if let Some(value) = lookup("CONFLICT_RETRIES") {
            config.conflict_retries = parse("CONFLICT_RETRIES", &value)?;
        }

        Ok(config)
    }

    pub fn with_snapshot_threshold(mut self, threshold: u64) -> Self {
        self.snapshot_threshold = threshold;
        self
    }

    pub fn with_compaction(mut self, mode: CompactionMode) -> Self {
        self.compaction = mode;
        self
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
