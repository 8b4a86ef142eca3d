//! Recourse Kernel
//!
//! The event-routed workflow engine behind the recourse review pipeline:
//!
//! - **[`engine`]** — static kind → handler routing with per-run
//!   serialization and a transition budget
//! - **[`context`]** — mutable per-run key/value state, durable via
//!   snapshot/restore
//! - **[`memo`]** — single-slot-per-entity memoization of expensive
//!   external calls, keyed by (entity, revision)
//! - **[`retry`]** — bounded exponential backoff with jitter and
//!   cancellation-aware waits
//! - **[`persistence`]** — durable storage boundary and the
//!   load → dispatch → always-save run cycle
//!
//! # Architecture
//!
//! This crate defines the machinery and the collaborator seams
//! ([`SnapshotStore`], [`StepHandler`], [`WorkflowEvent`]); concrete
//! event sets, steps, and vendor clients live in
//! `recourse-foundation`.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = WorkflowBuilder::new("story_sync")
//!     .add_step(ReviewEventKind::StoryChanged, Arc::new(fetch))
//!     .add_step(ReviewEventKind::StoryFetched, Arc::new(evaluate))
//!     .add_step(ReviewEventKind::StoryEvaluated, Arc::new(finish))
//!     .build()?;
//!
//! let adapter = RunPersistenceAdapter::new(Arc::new(FileSnapshotStore::new("state")));
//! let result = engine
//!     .run(&adapter, &run_id, seed, CancellationToken::new(), start_event)
//!     .await?;
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod memo;
pub mod persistence;
pub mod retry;

// Re-export public API
pub use context::RunContext;
pub use engine::{StepHandler, StepOutput, WorkflowBuilder, WorkflowEngine};
pub use error::{EngineError, EngineResult};
pub use event::WorkflowEvent;
pub use memo::CacheEntry;
pub use persistence::{FileSnapshotStore, MemorySnapshotStore, RunPersistenceAdapter, SnapshotStore};
pub use retry::{RetryExecutor, RetryPolicy};
