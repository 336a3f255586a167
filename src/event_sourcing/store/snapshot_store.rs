use std::marker::PhantomData;
use std::sync::Arc;

use super::blob::BlobStore;
use crate::event_sourcing::core::{Aggregate, StorageError};

// ============================================================================
// Snapshot Store
// ============================================================================
//
// Snapshots are a cache: one JSON document per aggregate, keyed
// "{TypeTag}.{id}" inside a single container, overwritten on every write.
// The log stays authoritative, so there is no versioning here.
//
// ============================================================================

pub const DEFAULT_SNAPSHOT_CONTAINER: &str = "snapshots";

pub struct SnapshotStore<A: Aggregate> {
    blobs: Arc<dyn BlobStore>,
    container: String,
    _phantom: PhantomData<fn() -> A>,
}

impl<A: Aggregate> Clone for SnapshotStore<A> {
    fn clone(&self) -> Self {
        Self {
            blobs: self.blobs.clone(),
            container: self.container.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<A: Aggregate> SnapshotStore<A> {
    pub fn new(blobs: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            blobs,
            container: container.into(),
            _phantom: PhantomData,
        }
    }

    pub fn key(id: &str) -> String {
        format!("{}.{}", A::TYPE_TAG, id)
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Latest snapshot for `id`; `None` when nothing has been stashed yet
    pub async fn get(&self, id: &str) -> Result<Option<A>, StorageError> {
        let key = Self::key(id);
        let Some(bytes) = self.blobs.get(&self.container, &key).await? else {
            return Ok(None);
        };

        let state = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::decode(format!("snapshot {}/{}", self.container, key), e))?;
        Ok(Some(state))
    }

    pub async fn put(&self, id: &str, state: &A) -> Result<(), StorageError> {
        let key = Self::key(id);
        let bytes = serde_json::to_vec(state)
            .map_err(|e| StorageError::encode(format!("snapshot {}/{}", self.container, key), e))?;

        self.blobs.put(&self.container, &key, bytes).await
    }
}
