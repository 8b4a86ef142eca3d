//! Feedback export step.

use async_trait::async_trait;
use std::path::Path;

use recourse_kernel::{memo, EngineError, EngineResult, RunContext, StepHandler, StepOutput};

use crate::events::ReviewEvent;
use crate::feedback::{Feedback, StoryFeedback};
use crate::review::{FEEDBACKS_NAMESPACE, STORY_FEEDBACKS_NAMESPACE};

/// Collects every feedback item accumulated in the run context and
/// writes the list to a JSON file.
///
/// Document feedback slots hold a single [`Feedback`]; story slots hold
/// a [`StoryFeedback`] whose items are flattened into the output.
/// Entries that fail to parse are skipped with a warning — they will be
/// recomputed by their own workflow on the next request.
pub struct ExportFeedbackStep;

#[async_trait]
impl StepHandler<ReviewEvent> for ExportFeedbackStep {
    async fn handle(
        &self,
        ctx: &RunContext,
        event: ReviewEvent,
    ) -> EngineResult<StepOutput<ReviewEvent>> {
        let ReviewEvent::ExportRequested { path, .. } = event else {
            return Err(EngineError::Step(
                "export_feedback received an unexpected event".into(),
            ));
        };

        let mut items: Vec<Feedback> = Vec::new();

        for entry in memo::entries(ctx, FEEDBACKS_NAMESPACE).await {
            match serde_json::from_value::<Feedback>(entry.value) {
                Ok(feedback) => items.push(feedback),
                Err(e) => {
                    tracing::warn!(entity_id = %entry.entity_id, error = %e, "skipping entry that is not a feedback");
                }
            }
        }
        for entry in memo::entries(ctx, STORY_FEEDBACKS_NAMESPACE).await {
            match serde_json::from_value::<StoryFeedback>(entry.value) {
                Ok(story_feedback) => items.extend(story_feedback.feedback),
                Err(e) => {
                    tracing::warn!(entity_id = %entry.entity_id, error = %e, "skipping entry that is not a story feedback");
                }
            }
        }

        let json = serde_json::to_vec_pretty(&items)?;
        if let Some(parent) = Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&path, &json).await?;

        tracing::info!(feedback_count = items.len(), file_path = %path, "feedback exported");
        Ok(StepOutput::Complete(serde_json::json!({
            "feedback_count": items.len(),
            "file_path": path,
        })))
    }

    fn name(&self) -> &str {
        "export_feedback"
    }
}
