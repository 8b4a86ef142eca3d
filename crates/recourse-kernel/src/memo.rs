//! Memoization of expensive external calls.
//!
//! Results are cached inside the run context under a namespace key (one
//! namespace per cached category, e.g. `"feedbacks"` vs
//! `"story_feedbacks"`), keyed by entity identifier with a single slot
//! per entity. A slot records the source revision it was computed
//! against and the identity of the producer, so a repeat request for the
//! same (entity, revision) pair returns the stored value without
//! invoking the producer — determinism by caching, not recomputation.
//!
//! A request for a different revision recomputes and overwrites the
//! slot; the previous revision's result is not resurrectable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

use crate::context::RunContext;
use crate::error::EngineResult;

/// A memoized result for one entity under one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Stable entity identifier (e.g. a backlog item key)
    pub entity_id: String,
    /// Source revision the value was computed against
    pub revision: String,
    /// Identity of the producer that computed the value (e.g. model name)
    pub produced_by: String,
    /// The fully-formed result
    pub value: Value,
}

/// Return the cached result for `(entity_id, revision)` or compute it.
///
/// - Slot present with a matching revision → cache hit; the producer is
///   not invoked and the stored entry is returned unchanged.
/// - Slot absent, or present under a different revision → the producer
///   runs and its result overwrites the slot before being returned.
/// - Producer error → the store is left unmodified and the error
///   propagates; no partial entry is ever written.
/// - Malformed slot content → logged and treated as a miss. The producer
///   is deterministic enough to regenerate a valid entry, so recovery
///   beats failing the run.
pub async fn get_or_compute<F, Fut>(
    ctx: &RunContext,
    namespace: &str,
    entity_id: &str,
    revision: &str,
    produced_by: &str,
    producer: F,
) -> EngineResult<CacheEntry>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = EngineResult<Value>>,
{
    if let Some(entry) = lookup(ctx, namespace, entity_id).await {
        if entry.revision == revision {
            tracing::debug!(namespace, entity_id, revision, "memoized result reused");
            return Ok(entry);
        }
        tracing::debug!(
            namespace,
            entity_id,
            cached_revision = %entry.revision,
            requested_revision = revision,
            "cached revision differs, recomputing"
        );
    }

    let value = producer().await?;
    let entry = CacheEntry {
        entity_id: entity_id.to_string(),
        revision: revision.to_string(),
        produced_by: produced_by.to_string(),
        value,
    };
    insert_entry(ctx, namespace, &entry).await?;
    Ok(entry)
}

/// Look up the slot for one entity; malformed content is a miss.
pub async fn lookup(ctx: &RunContext, namespace: &str, entity_id: &str) -> Option<CacheEntry> {
    let slots: Map<String, Value> = ctx.get(namespace).await?;
    let raw = slots.get(entity_id)?.clone();
    match serde_json::from_value(raw) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(
                namespace,
                entity_id,
                error = %e,
                "malformed cache entry, treating as a miss"
            );
            None
        }
    }
}

/// Write (or overwrite) the single slot for `entry.entity_id`.
///
/// Read-modify-write on the namespace map; safe because the engine
/// serializes all step execution for one run.
pub async fn insert_entry(ctx: &RunContext, namespace: &str, entry: &CacheEntry) -> EngineResult<()> {
    let mut slots: Map<String, Value> = ctx.get(namespace).await.unwrap_or_default();
    slots.insert(entry.entity_id.clone(), serde_json::to_value(entry)?);
    ctx.set(namespace, Value::Object(slots)).await
}

/// All well-formed entries in a namespace, ordered by entity identifier.
///
/// Malformed slots are skipped with a warning rather than failing the
/// caller; they will be recomputed on their next request.
pub async fn entries(ctx: &RunContext, namespace: &str) -> Vec<CacheEntry> {
    let Some(slots) = ctx.get::<Map<String, Value>>(namespace).await else {
        return Vec::new();
    };
    let mut out: Vec<CacheEntry> = Vec::new();
    for (entity_id, raw) in slots {
        match serde_json::from_value(raw) {
            Ok(entry) => out.push(entry),
            Err(e) => {
                tracing::warn!(namespace, %entity_id, error = %e, "skipping malformed cache entry");
            }
        }
    }
    out.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
    out
}
