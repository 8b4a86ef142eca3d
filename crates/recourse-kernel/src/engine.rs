//! Step router / workflow engine.
//!
//! A workflow is a static table mapping each event kind to exactly one
//! step handler. Dispatching a start event routes it to the matching
//! step, feeds the step's output event to the next matching step, and
//! stops when a step produces a terminal result instead of another
//! event.
//!
//! # Contract
//!
//! - The kind → handler table is validated when the workflow is built:
//!   registering two steps for one kind fails with
//!   [`EngineError::DuplicateStep`]. Dispatching an event whose kind has
//!   no registered step fails with [`EngineError::UnroutableEvent`]
//!   without touching the run context.
//! - Step execution within one run is strictly sequential; the engine
//!   holds a per-run lock for the whole dispatch so two runs against the
//!   same run identifier never interleave. Runs with different
//!   identifiers execute fully concurrently.
//! - A handler error propagates out and aborts the run; the context as
//!   of the last successful `set` is what gets persisted.
//! - Re-dispatching the identical start event against the same run
//!   identifier is safe: steps memoize their expensive calls, so the
//!   previously computed terminal result comes back without recomputing.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};
use crate::event::WorkflowEvent;
use crate::persistence::RunPersistenceAdapter;

/// What a step produced: the next event, or the run's terminal result.
#[derive(Debug, Clone)]
pub enum StepOutput<E> {
    /// Continue routing with this event
    Next(E),
    /// Halt the run with this terminal result
    Complete(Value),
}

/// A registered step: consumes events of one kind, reads/writes the run
/// context, and returns the next event or a terminal result.
///
/// # Example
///
/// ```rust,ignore
/// struct FetchStep { reader: Arc<dyn BacklogReader> }
///
/// #[async_trait]
/// impl StepHandler<ReviewEvent> for FetchStep {
///     async fn handle(
///         &self,
///         ctx: &RunContext,
///         event: ReviewEvent,
///     ) -> EngineResult<StepOutput<ReviewEvent>> {
///         // ...fetch, ctx.set(...), construct the next event
///     }
///
///     fn name(&self) -> &str {
///         "fetch_story"
///     }
/// }
/// ```
#[async_trait]
pub trait StepHandler<E: WorkflowEvent>: Send + Sync {
    /// Execute the step
    async fn handle(&self, ctx: &RunContext, event: E) -> EngineResult<StepOutput<E>>;

    /// Step name, used in logs
    fn name(&self) -> &str;
}

/// Builder collecting step registrations for one workflow.
pub struct WorkflowBuilder<E: WorkflowEvent> {
    id: String,
    steps: Vec<(E::Kind, Arc<dyn StepHandler<E>>)>,
    max_transitions: u32,
}

impl<E: WorkflowEvent> WorkflowBuilder<E> {
    /// Create a builder for the workflow with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            max_transitions: 32,
        }
    }

    /// Register a step for the event kind it accepts
    pub fn add_step(mut self, kind: E::Kind, handler: Arc<dyn StepHandler<E>>) -> Self {
        self.steps.push((kind, handler));
        self
    }

    /// Override the transition budget (default 32)
    pub fn with_max_transitions(mut self, max_transitions: u32) -> Self {
        self.max_transitions = max_transitions;
        self
    }

    /// Validate the registration table and produce the engine.
    ///
    /// Uniqueness is checked here, at build time, so a misconfigured
    /// workflow fails before it ever sees an event.
    pub fn build(self) -> EngineResult<WorkflowEngine<E>> {
        let mut steps: HashMap<E::Kind, Arc<dyn StepHandler<E>>> = HashMap::new();
        for (kind, handler) in self.steps {
            if steps.insert(kind, handler).is_some() {
                return Err(EngineError::DuplicateStep(format!("{kind:?}")));
            }
        }
        Ok(WorkflowEngine {
            id: self.id,
            steps,
            max_transitions: self.max_transitions,
            run_locks: Mutex::new(HashMap::new()),
        })
    }
}

/// The event router. Holds the validated kind → handler table and
/// serializes dispatch per run identifier.
pub struct WorkflowEngine<E: WorkflowEvent> {
    id: String,
    steps: HashMap<E::Kind, Arc<dyn StepHandler<E>>>,
    max_transitions: u32,
    run_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<E: WorkflowEvent> WorkflowEngine<E> {
    /// The workflow id
    pub fn id(&self) -> &str {
        &self.id
    }

    async fn run_lock(&self, run_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.run_locks.lock().await;
        locks
            .entry(run_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Dispatch a start event against an already-loaded run context.
    ///
    /// Serialized per run identifier; the per-run lock is held until the
    /// terminal result (or error) is produced.
    pub async fn dispatch(&self, ctx: &RunContext, start: E) -> EngineResult<Value> {
        let lock = self.run_lock(ctx.run_id()).await;
        let _guard = lock.lock().await;
        self.dispatch_serialized(ctx, start).await
    }

    async fn dispatch_serialized(&self, ctx: &RunContext, start: E) -> EngineResult<Value> {
        let mut event = start;
        for _ in 0..self.max_transitions {
            if ctx.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let kind = event.kind();
            let step = self
                .steps
                .get(&kind)
                .ok_or_else(|| EngineError::UnroutableEvent(format!("{kind:?}")))?;
            tracing::debug!(
                workflow = %self.id,
                run_id = %ctx.run_id(),
                step = step.name(),
                kind = ?kind,
                "dispatching event"
            );
            match step.handle(ctx, event).await? {
                StepOutput::Next(next) => event = next,
                StepOutput::Complete(value) => {
                    tracing::debug!(
                        workflow = %self.id,
                        run_id = %ctx.run_id(),
                        "run reached terminal result"
                    );
                    return Ok(value);
                }
            }
        }
        Err(EngineError::StepLimitExceeded(self.max_transitions))
    }

    /// The full run cycle: load (or seed) the run context from durable
    /// storage, dispatch, and ALWAYS save the context back — on success,
    /// on error, and on cancellation — so partial progress survives and
    /// a retried run resumes instead of restarting.
    ///
    /// The per-run lock covers load, dispatch, and save: concurrent
    /// retried invocations for one run identifier are serialized end to
    /// end, and the later save wins.
    pub async fn run(
        &self,
        adapter: &RunPersistenceAdapter,
        run_id: &str,
        seed: Map<String, Value>,
        cancel: CancellationToken,
        start: E,
    ) -> EngineResult<Value> {
        let lock = self.run_lock(run_id).await;
        let _guard = lock.lock().await;

        let ctx = adapter.load(run_id, seed).await?.with_cancel_token(cancel);
        let outcome = self.dispatch_serialized(&ctx, start).await;

        if let Err(save_err) = adapter.save(&ctx).await {
            tracing::error!(run_id, error = %save_err, "failed to checkpoint run context");
            // a failed checkpoint must not mask the run's own failure;
            // after a successful run the caller has to know the result
            // is not durable
            if outcome.is_ok() {
                return Err(save_err);
            }
        }
        outcome
    }
}
