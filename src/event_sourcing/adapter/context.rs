use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::config::{AdapterConfig, Backend};
use crate::event_sourcing::store::{
    BlobStore, EventLog, FsBlobStore, InMemoryBlobStore, InMemoryEventLog, ScyllaEventLog,
};
use crate::metrics::Metrics;

// ============================================================================
// Storage Context
// ============================================================================
//
// Owns the log client, blob client, metrics and configuration shared by every
// aggregate adapter in the process. Built explicitly at startup and handed to
// adapters; `shutdown` drains snapshot writes still running in the
// background.
//
// ============================================================================

pub struct StorageContext {
    log: Arc<dyn EventLog>,
    blobs: Arc<dyn BlobStore>,
    metrics: Arc<Metrics>,
    config: AdapterConfig,
    background: Arc<BackgroundTasks>,
}

impl StorageContext {
    pub fn new(
        config: AdapterConfig,
        log: Arc<dyn EventLog>,
        blobs: Arc<dyn BlobStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            log,
            blobs,
            metrics,
            config,
            background: Arc::new(BackgroundTasks::default()),
        }
    }

    /// In-process log and blobs with a fresh metrics registry
    pub fn in_memory(config: AdapterConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            config,
            Arc::new(InMemoryEventLog::new()),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(Metrics::new()?),
        ))
    }

    /// Connect to the backends named in `config`
    pub async fn connect(config: AdapterConfig) -> anyhow::Result<Self> {
        match config.backend {
            Backend::Memory => {
                tracing::info!("Using in-memory event log and blob store");
                Self::in_memory(config)
            }
            Backend::Scylla => {
                let log = ScyllaEventLog::connect(&config.scylla_node, &config.keyspace).await?;
                let blobs = FsBlobStore::new(&config.blob_root);
                tracing::info!(
                    node = %config.scylla_node,
                    keyspace = %config.keyspace,
                    blob_root = %blobs.root().display(),
                    "Connected storage backends"
                );

                Ok(Self::new(
                    config,
                    Arc::new(log),
                    Arc::new(blobs),
                    Arc::new(Metrics::new()?),
                ))
            }
        }
    }

    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub(crate) fn background(&self) -> &Arc<BackgroundTasks> {
        &self.background
    }

    /// Wait for background snapshot writes; returns how many were drained
    ///
    /// Must be called before the last handle is dropped, otherwise pending
    /// writes are aborted (a warning is logged).
    pub async fn shutdown(&self) -> usize {
        let drained = self.background.drain().await;
        tracing::info!(drained, "Storage context shut down");
        drained
    }
}

/// Tracked fire-and-forget tasks
#[derive(Default)]
pub(crate) struct BackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub(crate) async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        // Reap whatever already finished so the set does not grow unbounded
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    pub(crate) async fn drain(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        let mut drained = 0;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Background task panicked or was cancelled");
            }
            drained += 1;
        }
        drained
    }

    /// Tasks that have not finished yet
    fn unfinished(&mut self) -> usize {
        let tasks = self.tasks.get_mut();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        // Dropping the JoinSet aborts whatever is still running
        let pending = self.unfinished();
        if pending > 0 {
            tracing::warn!(
                pending,
                "Background tasks dropped without StorageContext::shutdown, pending snapshot writes aborted"
            );
        }
    }
}
