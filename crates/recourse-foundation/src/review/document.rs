//! Document review step.

use async_trait::async_trait;
use std::sync::Arc;

use recourse_kernel::{
    memo, EngineError, EngineResult, RetryExecutor, RetryPolicy, RunContext, StepHandler,
    StepOutput,
};

use crate::events::ReviewEvent;
use crate::feedback::Feedback;
use crate::fetcher::ContentFetcher;
use crate::generation::GenerationProvider;
use crate::review::{GeneratedFeedback, FEEDBACKS_NAMESPACE};

/// Evaluates a changed document with a reviewer prompt and produces one
/// structured feedback item.
///
/// The whole fetch-and-generate pair is the memoized producer, keyed by
/// (file url, revision): a re-delivered event for the same revision
/// touches neither the fetcher nor the generator.
pub struct EvaluateDocumentStep {
    provider: Arc<dyn GenerationProvider>,
    fetcher: Arc<dyn ContentFetcher>,
    retry: RetryExecutor,
    prompt: String,
}

impl EvaluateDocumentStep {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        fetcher: Arc<dyn ContentFetcher>,
        policy: RetryPolicy,
        prompt: String,
    ) -> Self {
        Self {
            provider,
            fetcher,
            retry: RetryExecutor::new(policy),
            prompt,
        }
    }
}

#[async_trait]
impl StepHandler<ReviewEvent> for EvaluateDocumentStep {
    async fn handle(
        &self,
        ctx: &RunContext,
        event: ReviewEvent,
    ) -> EngineResult<StepOutput<ReviewEvent>> {
        let ReviewEvent::DocumentUpdated {
            file_url,
            author,
            revision,
            ..
        } = event
        else {
            return Err(EngineError::Step(
                "evaluate_document received an unexpected event".into(),
            ));
        };

        let entry = memo::get_or_compute(
            ctx,
            FEEDBACKS_NAMESPACE,
            &file_url,
            &revision,
            self.provider.name(),
            || async {
                let content = self
                    .retry
                    .execute(ctx.cancel_token(), || self.fetcher.fetch(&file_url))
                    .await?;

                let prompt = format!(
                    "{}\n\nDocument Content:\n{}\n\nPlease evaluate this document and \
                     provide feedback. The feedback should be either a Question or a \
                     Recommendation.",
                    self.prompt, content
                );

                let schema = Feedback::response_schema();
                let raw = self
                    .retry
                    .execute(ctx.cancel_token(), || {
                        self.provider.generate(&prompt, &schema)
                    })
                    .await?;

                let generated: GeneratedFeedback = serde_json::from_value(raw)?;
                let feedback =
                    Feedback::new(generated.kind, author, generated.text, revision.clone())
                        .with_file_url(file_url.clone());
                Ok(serde_json::to_value(feedback)?)
            },
        )
        .await?;

        tracing::info!(
            file_url = %entry.entity_id,
            revision = %entry.revision,
            produced_by = %entry.produced_by,
            "document feedback ready"
        );
        Ok(StepOutput::Complete(entry.value))
    }

    fn name(&self) -> &str {
        "evaluate_document"
    }
}
