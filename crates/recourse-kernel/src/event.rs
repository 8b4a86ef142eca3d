//! Workflow event contract.
//!
//! Events are immutable tagged payloads: each carries a kind tag that
//! selects the step consuming it, plus kind-specific fields. Steps never
//! mutate an event — they construct a fresh one from the previous event's
//! data and their own results.
//!
//! This module defines the trait only (kernel layer). Concrete event sets
//! are closed enums defined by the crates that build workflows, so the
//! kind → handler table is checked for uniqueness when the workflow is
//! built, not discovered at first dispatch.

use std::fmt::Debug;
use std::hash::Hash;

/// A routable workflow event.
///
/// `Kind` is the discriminant the engine routes on. Implementations are
/// expected to be `enum`s whose `kind()` is a cheap tag projection.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum SyncKind { Requested, Fetched }
///
/// #[derive(Debug, Clone)]
/// enum SyncEvent {
///     Requested { id: String },
///     Fetched { id: String, body: String },
/// }
///
/// impl WorkflowEvent for SyncEvent {
///     type Kind = SyncKind;
///     fn kind(&self) -> SyncKind {
///         match self {
///             SyncEvent::Requested { .. } => SyncKind::Requested,
///             SyncEvent::Fetched { .. } => SyncKind::Fetched,
///         }
///     }
/// }
/// ```
pub trait WorkflowEvent: Clone + Send + Sync + 'static {
    /// Discriminant type the engine routes on
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    /// The kind tag of this event
    fn kind(&self) -> Self::Kind;
}
