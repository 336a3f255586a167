use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::event_sourcing::core::StorageError;

// ============================================================================
// Blob Store Collaborator
// ============================================================================
//
// Flat key/value blobs grouped into containers. Containers are created on
// first access; a missing key is `Ok(None)`, never an error.
//
// ============================================================================

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, container: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create or overwrite `key`
    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
}

// ============================================================================
// In-Memory Blob Store
// ============================================================================

#[derive(Default)]
pub struct InMemoryBlobStore {
    containers: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
    provisioned: Mutex<Vec<String>>,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    gets: AtomicU64,
    puts: AtomicU64,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// Containers in the order they were provisioned
    pub async fn provisioned_containers(&self) -> Vec<String> {
        self.provisioned.lock().await.clone()
    }

    pub async fn keys(&self, container: &str) -> Vec<String> {
        let containers = self.containers.lock().await;
        let mut keys: Vec<_> = containers
            .get(container)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Overwrite a blob directly, e.g. to plant a corrupt document
    pub async fn insert_raw(&self, container: &str, key: &str, bytes: &[u8]) {
        let mut containers = self.containers.lock().await;
        self.provision(&mut containers, container).await;
        if let Some(blobs) = containers.get_mut(container) {
            blobs.insert(key.to_string(), bytes.to_vec());
        }
    }

    async fn provision(
        &self,
        containers: &mut HashMap<String, HashMap<String, Vec<u8>>>,
        container: &str,
    ) {
        if !containers.contains_key(container) {
            containers.insert(container.to_string(), HashMap::new());
            self.provisioned.lock().await.push(container.to_string());
            tracing::debug!(container = %container, "Provisioned blob container");
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, container: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("blob store", "injected get failure"));
        }

        let mut containers = self.containers.lock().await;
        self.provision(&mut containers, container).await;
        Ok(containers
            .get(container)
            .and_then(|blobs| blobs.get(key))
            .cloned())
    }

    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("blob store", "injected put failure"));
        }

        let mut containers = self.containers.lock().await;
        self.provision(&mut containers, container).await;
        if let Some(blobs) = containers.get_mut(container) {
            blobs.insert(key.to_string(), bytes);
        }
        Ok(())
    }
}

// ============================================================================
// Filesystem Blob Store
// ============================================================================
//
// One directory per container under `root`, one file per key. Writes go to
// a temporary sibling first and are renamed into place, so readers never see
// a half-written blob.
//
// Keys are opaque: each one is percent-encoded into a file name, and names
// that would grow past `MAX_FILE_NAME` keep a readable prefix plus a SHA-256
// of the whole key.
//
// ============================================================================

pub struct FsBlobStore {
    root: PathBuf,
    provisioned: Mutex<HashSet<String>>,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            provisioned: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn container_dir(&self, container: &str) -> Result<PathBuf, StorageError> {
        validate_segment("container", container)?;
        let dir = self.root.join(container);

        let mut provisioned = self.provisioned.lock().await;
        if !provisioned.contains(container) {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::unavailable("filesystem blob store", e))?;
            provisioned.insert(container.to_string());
            tracing::debug!(container = %container, path = %dir.display(), "Provisioned blob container");
        }

        Ok(dir)
    }
}

fn validate_segment(what: &str, value: &str) -> Result<(), StorageError> {
    if value.is_empty() || value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(StorageError::InvalidArgument(format!(
            "{} name `{}` is not a valid path segment",
            what, value
        )));
    }
    Ok(())
}

/// Longest file name produced for a key, well under the usual 255 byte limit
const MAX_FILE_NAME: usize = 200;
const HASHED_PREFIX: usize = 128;

/// File name for an opaque blob key
fn file_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => name.push(byte as char),
            // A leading dot would hide the file or collide with temp files
            b'.' if i > 0 => name.push('.'),
            _ => name.push_str(&format!("%{:02X}", byte)),
        }
    }

    if name.len() <= MAX_FILE_NAME {
        return name;
    }

    use sha2::{Digest, Sha256};
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    // Encoded names are ASCII, so any byte index is a char boundary
    format!("{}~{}", &name[..HASHED_PREFIX], digest)
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, container: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.container_dir(container).await?.join(file_name(key));

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::unavailable("filesystem blob store", e)),
        }
    }

    async fn put(&self, container: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let dir = self.container_dir(container).await?;
        let name = file_name(key);
        let path = dir.join(&name);
        let tmp = dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));

        let written = match tokio::fs::write(&tmp, &bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temp blob");
                }
            }
            return Err(StorageError::unavailable("filesystem blob store", e));
        }

        Ok(())
    }
}
