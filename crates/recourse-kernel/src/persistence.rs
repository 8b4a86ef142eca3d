//! Durable storage for run contexts.
//!
//! The [`SnapshotStore`] trait is the storage boundary: opaque bytes in,
//! opaque bytes out, keyed by run identifier. The
//! [`RunPersistenceAdapter`] sits on top and speaks [`RunContext`]:
//! load-or-seed before a run, save after — always, so a crash mid-run
//! costs only the failing step, not the whole pipeline.
//!
//! One run identifier has exactly one writer at a time (the engine's
//! per-run lock), so the store itself only has to guarantee that no
//! partial write is ever observable.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};

/// Byte-level durable storage keyed by run identifier.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the record for `key`, or `None` if absent
    async fn read(&self, key: &str) -> EngineResult<Option<Vec<u8>>>;

    /// Write the record for `key`, overwriting any prior record.
    /// A concurrent reader must never observe a partial write.
    async fn write(&self, key: &str, bytes: &[u8]) -> EngineResult<()>;
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemorySnapshotStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> EngineResult<()> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// File-per-run store. Writes go to a temporary sibling first and are
/// moved into place with an atomic rename.
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store rooted at `root` (created on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory snapshots live in
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // run keys may embed URLs or backlog ids; keep the file name
        // filesystem-safe
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("workflow_ctx_{safe}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn read(&self, key: &str) -> EngineResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> EngineResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Loads a run context before execution and writes it back after.
///
/// The adapter is the sole writer of durable storage for a given run
/// identifier; the engine serializes its calls per run.
#[derive(Clone)]
pub struct RunPersistenceAdapter {
    store: Arc<dyn SnapshotStore>,
}

impl RunPersistenceAdapter {
    /// Create an adapter over the given store
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Deterministic run key for a (project, entity) pair
    pub fn run_key(project: &str, entity_id: &str) -> String {
        format!("{project}_{entity_id}")
    }

    /// Load the context for `run_id`, or create one seeded with
    /// `seed` if no durable record exists.
    ///
    /// A corrupt record is a [`EngineError::Deserialization`] — falling
    /// back to an empty store would silently discard prior progress.
    pub async fn load(&self, run_id: &str, seed: Map<String, Value>) -> EngineResult<RunContext> {
        match self.store.read(run_id).await? {
            Some(bytes) => {
                tracing::debug!(run_id, "restoring run context from durable storage");
                RunContext::restore(run_id, &bytes)
            }
            None => {
                tracing::debug!(run_id, "no durable record, creating seeded run context");
                Ok(RunContext::seeded(run_id, seed))
            }
        }
    }

    /// Snapshot the context and write it under its run identifier
    pub async fn save(&self, ctx: &RunContext) -> EngineResult<()> {
        let bytes = ctx.snapshot().await?;
        self.store.write(ctx.run_id(), &bytes).await
    }
}
