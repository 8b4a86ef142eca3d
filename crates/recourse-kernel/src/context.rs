//! Run context store.
//!
//! A [`RunContext`] is the mutable key/value state of exactly one workflow
//! run. It is created empty (or seeded with caller fields such as backlog
//! credentials), mutated by steps while the run executes, and serialized
//! to durable storage when the run ends so a retried run resumes instead
//! of starting over.
//!
//! # Core principles
//!
//! - Readers treat a missing key as "empty", never as an error.
//! - `set` replaces the prior value for a key entirely. Callers needing
//!   merge semantics must read-modify-write; that compound operation is
//!   not atomic and relies on the engine's per-run serialization.
//! - `restore` rejects malformed bytes instead of returning a partially
//!   populated store.
//! - The context is passed explicitly to every step handler. There is no
//!   ambient singleton, so concurrent runs over different run identifiers
//!   share no mutable state.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineResult};

/// Mutable per-run key/value state, durable via snapshot/restore.
///
/// Cloning is cheap and shares the underlying state; a clone observes the
/// same run.
///
/// # Example
///
/// ```rust,ignore
/// let ctx = RunContext::new("PROJ_STORY-1");
/// ctx.set("story", &story).await?;
/// let story: Option<Story> = ctx.get("story").await;
/// ```
#[derive(Clone)]
pub struct RunContext {
    run_id: String,
    state: Arc<RwLock<Map<String, Value>>>,
    cancel: CancellationToken,
}

impl RunContext {
    /// Create an empty context for the given run identifier
    pub fn new(run_id: impl Into<String>) -> Self {
        Self::from_map(run_id, Map::new())
    }

    /// Create a context pre-populated with caller-supplied fields
    /// (e.g. credentials the steps will need)
    pub fn seeded(run_id: impl Into<String>, seed: Map<String, Value>) -> Self {
        Self::from_map(run_id, seed)
    }

    fn from_map(run_id: impl Into<String>, map: Map<String, Value>) -> Self {
        Self {
            run_id: run_id.into(),
            state: Arc::new(RwLock::new(map)),
            cancel: CancellationToken::new(),
        }
    }

    /// Rebuild a context from snapshot bytes.
    ///
    /// Malformed input is a [`EngineError::Deserialization`] — the caller
    /// must decide what losing the prior progress means; the store never
    /// silently comes back empty.
    pub fn restore(run_id: impl Into<String>, bytes: &[u8]) -> EngineResult<Self> {
        let map: Map<String, Value> = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::Deserialization(e.to_string()))?;
        Ok(Self::from_map(run_id, map))
    }

    /// Attach a cancellation token (e.g. a request deadline)
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The run identifier this state belongs to
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get a value by key.
    ///
    /// Returns `None` for an absent key. A stored value that does not
    /// deserialize into `T` also yields `None` with a warning — the
    /// stored type may not match the requested type.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let state = self.state.read().await;
        state.get(key).and_then(|v| {
            match serde_json::from_value(v.clone()) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "stored value does not match requested type");
                    None
                }
            }
        })
    }

    /// Set a value, replacing any prior value for that key entirely
    pub async fn set<T: Serialize>(&self, key: &str, value: T) -> EngineResult<()> {
        let v = serde_json::to_value(value)?;
        let mut state = self.state.write().await;
        state.insert(key.to_string(), v);
        Ok(())
    }

    /// Check whether a key is present
    pub async fn contains(&self, key: &str) -> bool {
        let state = self.state.read().await;
        state.contains_key(key)
    }

    /// All keys currently present
    pub async fn keys(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.keys().cloned().collect()
    }

    /// Serialize the full state to durable bytes
    pub async fn snapshot(&self) -> EngineResult<Vec<u8>> {
        let state = self.state.read().await;
        Ok(serde_json::to_vec(&*state)?)
    }

    /// The cancellation token for this run
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
