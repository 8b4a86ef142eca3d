//! Recourse Foundation
//!
//! Concrete building blocks for the recourse review pipeline, on top of
//! the `recourse-kernel` engine:
//!
//! - **[`feedback`]** / **[`model`]** — the review data model
//! - **[`events`]** — the closed review event set the workflows route on
//! - **[`generation`]** — structured-output generation boundary and the
//!   Gemini implementation
//! - **[`backlog`]** — backlog reader boundary and the REST
//!   implementation
//! - **[`fetcher`]** — document content fetching
//! - **[`review`]** — the document review, story sync, and feedback
//!   export workflows

pub mod backlog;
pub mod events;
pub mod feedback;
pub mod fetcher;
pub mod generation;
pub mod model;
pub mod review;

// Re-export public API
pub use backlog::{BacklogCredentials, BacklogReader, HttpBacklogReader};
pub use events::{ChangeAction, ReviewEvent, ReviewEventKind};
pub use feedback::{Author, Comment, Feedback, FeedbackKind, StoryFeedback};
pub use fetcher::{ContentFetcher, UrlContentFetcher};
pub use generation::{GeminiConfig, GeminiGenerator, GenerationProvider};
pub use model::{Description, Story, StoryComment};
pub use review::{
    document_review_workflow, feedback_export_workflow, story_sync_workflow,
};
