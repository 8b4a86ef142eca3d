//! Review workflows.
//!
//! Three pipelines, each a small step graph over [`ReviewEvent`]:
//!
//! - **document review** — a reviewer role evaluates a changed document
//!   and produces one structured [`Feedback`](crate::feedback::Feedback)
//! - **story sync** — fetch a backlog item, score it against the story
//!   rubric, memoize the result
//! - **feedback export** — write everything accumulated in the run
//!   context out to a JSON file
//!
//! Steps take their collaborators as `Arc<dyn Trait>`, wrap every
//! external call in the kernel retry executor, and memoize through the
//! kernel layer so re-delivered events short-circuit instead of paying
//! for the call again.

mod document;
mod export;
mod story_sync;

pub use document::EvaluateDocumentStep;
pub use export::ExportFeedbackStep;
pub use story_sync::{EvaluateStoryStep, FetchStoryStep, FinishStoryStep};

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use recourse_kernel::{EngineResult, RetryPolicy, WorkflowBuilder, WorkflowEngine};

use crate::backlog::BacklogReader;
use crate::events::{ReviewEvent, ReviewEventKind};
use crate::feedback::FeedbackKind;
use crate::fetcher::ContentFetcher;
use crate::generation::GenerationProvider;

/// Run-context namespace for document feedback, keyed by file url
pub const FEEDBACKS_NAMESPACE: &str = "feedbacks";
/// Run-context namespace for story feedback, keyed by backlog id
pub const STORY_FEEDBACKS_NAMESPACE: &str = "story_feedbacks";
/// Run-context namespace for fetched stories, keyed by backlog id
pub const STORIES_NAMESPACE: &str = "stories";
/// Run-context key holding the seeded backlog credentials
pub const CREDENTIALS_KEY: &str = "credentials";
/// Run-context key holding the most recently fetched story
pub const STORY_KEY: &str = "story";

/// Fallback reviewer prompt when no prompt file is configured
pub const DEFAULT_REVIEWER_PROMPT: &str =
    "Evaluate the document content and provide feedback as a Product Manager.";

/// Fallback story rubric when no criteria file is configured
pub const DEFAULT_STORY_CRITERIA: &str = "\
You are evaluating a backlog story against the team's story-writing criteria.

A well-formed story must:
- name the circumstance the customer is in and the progress they are trying to make;
- separate functional, emotional, and social dimensions of that progress;
- state the forces pushing toward and the anxieties holding back the change;
- be testable: a reader can tell when the story is done;
- fit the template: context, goal, and acceptance criteria are all present.

Identify the single most important gap between the story below and these
criteria. Respond with a Question when information is missing, or a
Recommendation when the story should be restructured.";

/// Read a prompt/rubric text from `path`, falling back to `default`
/// when the path is unset or unreadable.
pub fn load_text_or_default(path: Option<&Path>, default: &str) -> String {
    match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "falling back to built-in text");
                default.to_string()
            }
        },
        None => default.to_string(),
    }
}

/// The fields a generation call fills in; everything else on a
/// [`Feedback`](crate::feedback::Feedback) comes from the triggering
/// event.
#[derive(Debug, Deserialize)]
pub(crate) struct GeneratedFeedback {
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    pub text: String,
}

/// Build the single-step document review workflow.
pub fn document_review_workflow(
    provider: Arc<dyn GenerationProvider>,
    fetcher: Arc<dyn ContentFetcher>,
    policy: RetryPolicy,
    prompt: String,
) -> EngineResult<WorkflowEngine<ReviewEvent>> {
    WorkflowBuilder::new("document_review")
        .add_step(
            ReviewEventKind::DocumentUpdated,
            Arc::new(EvaluateDocumentStep::new(provider, fetcher, policy, prompt)),
        )
        .build()
}

/// Build the three-step story sync workflow.
pub fn story_sync_workflow(
    reader: Arc<dyn BacklogReader>,
    provider: Arc<dyn GenerationProvider>,
    policy: RetryPolicy,
    criteria: String,
) -> EngineResult<WorkflowEngine<ReviewEvent>> {
    WorkflowBuilder::new("story_sync")
        .add_step(
            ReviewEventKind::StoryChanged,
            Arc::new(FetchStoryStep::new(reader, policy.clone())),
        )
        .add_step(
            ReviewEventKind::StoryFetched,
            Arc::new(EvaluateStoryStep::new(provider, policy, criteria)),
        )
        .add_step(ReviewEventKind::StoryEvaluated, Arc::new(FinishStoryStep))
        .build()
}

/// Build the single-step feedback export workflow.
pub fn feedback_export_workflow() -> EngineResult<WorkflowEngine<ReviewEvent>> {
    WorkflowBuilder::new("feedback_export")
        .add_step(ReviewEventKind::ExportRequested, Arc::new(ExportFeedbackStep))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_text_prefers_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "custom rubric").unwrap();

        let text = load_text_or_default(Some(file.path()), DEFAULT_STORY_CRITERIA);
        assert_eq!(text, "custom rubric");
    }

    #[test]
    fn test_load_text_falls_back() {
        let text = load_text_or_default(None, DEFAULT_REVIEWER_PROMPT);
        assert_eq!(text, DEFAULT_REVIEWER_PROMPT);

        let text = load_text_or_default(
            Some(Path::new("/no/such/prompt.md")),
            DEFAULT_REVIEWER_PROMPT,
        );
        assert_eq!(text, DEFAULT_REVIEWER_PROMPT);
    }
}
