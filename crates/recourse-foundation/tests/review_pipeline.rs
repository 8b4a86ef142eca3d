//! End-to-end workflow tests with stubbed collaborators: the fetch /
//! evaluate / finish chain, idempotent re-dispatch, revision-sensitive
//! cache invalidation, and checkpoint-on-cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use recourse_foundation::review::{
    story_sync_workflow, CREDENTIALS_KEY, DEFAULT_STORY_CRITERIA, STORY_FEEDBACKS_NAMESPACE,
};
use recourse_foundation::{
    document_review_workflow, BacklogCredentials, BacklogReader, ChangeAction, ContentFetcher,
    Feedback, FeedbackKind, GenerationProvider, ReviewEvent, Story, StoryFeedback,
};
use recourse_kernel::{
    memo, EngineError, EngineResult, MemorySnapshotStore, RetryPolicy, RunPersistenceAdapter,
};

struct StubReader {
    text: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl BacklogReader for StubReader {
    async fn fetch_story(
        &self,
        _credentials: &BacklogCredentials,
        story_id: &str,
    ) -> EngineResult<Story> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut story = Story::new(story_id, "Platform Story Evaluation Feature", "backlog");
        story.push_revision(self.text.clone(), "backlog");
        Ok(story)
    }
}

struct StubGenerator {
    kind: &'static str,
    text: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl GenerationProvider for StubGenerator {
    fn name(&self) -> &str {
        "stub-model"
    }

    async fn generate(&self, _prompt: &str, _output_schema: &Value) -> EngineResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "type": self.kind, "text": self.text }))
    }
}

struct StubFetcher {
    content: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ContentFetcher for StubFetcher {
    async fn fetch(&self, _reference: &str) -> EngineResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.content.clone())
    }
}

fn credentials_seed() -> Map<String, Value> {
    let mut seed = Map::new();
    seed.insert(
        CREDENTIALS_KEY.to_string(),
        json!({
            "email": "reviewer@example.com",
            "api_token": "token",
            "server_url": "https://backlog.example.com"
        }),
    );
    seed
}

struct SyncFixture {
    adapter: RunPersistenceAdapter,
    reader_calls: Arc<AtomicUsize>,
}

impl SyncFixture {
    fn new() -> Self {
        Self {
            adapter: RunPersistenceAdapter::new(Arc::new(MemorySnapshotStore::new())),
            reader_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run one story sync against the shared store, with a generator
    /// stubbed to produce `text`. Returns the terminal value and the
    /// generator's call counter.
    async fn sync(
        &self,
        revision: &str,
        text: &str,
    ) -> (EngineResult<Value>, Arc<AtomicUsize>) {
        let gen_calls = Arc::new(AtomicUsize::new(0));
        let engine = story_sync_workflow(
            Arc::new(StubReader {
                text: "as a user I want X".into(),
                calls: self.reader_calls.clone(),
            }),
            Arc::new(StubGenerator {
                kind: "Question",
                text: text.into(),
                calls: gen_calls.clone(),
            }),
            RetryPolicy::default(),
            DEFAULT_STORY_CRITERIA.to_string(),
        )
        .unwrap();

        let run_id = RunPersistenceAdapter::run_key("TEST", "STORY-1");
        let result = engine
            .run(
                &self.adapter,
                &run_id,
                credentials_seed(),
                CancellationToken::new(),
                ReviewEvent::story_changed("STORY-1", revision, ChangeAction::Created),
            )
            .await;
        (result, gen_calls)
    }
}

#[tokio::test]
async fn story_sync_produces_and_caches_the_evaluation() {
    let fixture = SyncFixture::new();

    let (result, gen_calls) = fixture.sync("v1", "what is X?").await;
    let value = result.unwrap();

    let feedback: StoryFeedback = serde_json::from_value(value.clone()).unwrap();
    assert_eq!(feedback.feedback.len(), 1);
    assert_eq!(feedback.feedback[0].kind, FeedbackKind::Question);
    assert_eq!(feedback.feedback[0].text, "what is X?");
    assert_eq!(feedback.story.id, "STORY-1");
    assert_eq!(feedback.updated_by, "stub-model");
    assert_eq!(gen_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.reader_calls.load(Ordering::SeqCst), 1);

    // the durable store holds the same evaluation under the entity slot
    let run_id = RunPersistenceAdapter::run_key("TEST", "STORY-1");
    let ctx = fixture.adapter.load(&run_id, Map::new()).await.unwrap();
    let entry = memo::lookup(&ctx, STORY_FEEDBACKS_NAMESPACE, "STORY-1")
        .await
        .expect("evaluation must be cached");
    assert_eq!(entry.revision, "v1");
    assert_eq!(entry.value, value);
}

#[tokio::test]
async fn re_dispatch_returns_the_original_without_reinvoking_producers() {
    let fixture = SyncFixture::new();

    let (first, _) = fixture.sync("v1", "what is X?").await;
    let first = first.unwrap();

    // second dispatch with a generator that would answer differently:
    // the cached evaluation must come back and the stub must stay cold
    let (second, second_gen_calls) = fixture.sync("v1", "a completely different answer").await;
    let second = second.unwrap();

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(second_gen_calls.load(Ordering::SeqCst), 0);
    // the backlog fetch is memoized as well
    assert_eq!(fixture.reader_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn revision_change_recomputes_and_overwrites_the_slot() {
    let fixture = SyncFixture::new();

    let (v1, _) = fixture.sync("v1", "first evaluation").await;
    let v1 = v1.unwrap();

    let (v2, v2_calls) = fixture.sync("v2", "second evaluation").await;
    let v2 = v2.unwrap();
    assert_eq!(v2_calls.load(Ordering::SeqCst), 1);
    assert_ne!(v1, v2);

    // v1 was evicted by v2; asking for it again recomputes instead of
    // resurrecting the stale entry
    let (v1_again, v1_again_calls) = fixture.sync("v1", "recomputed evaluation").await;
    let v1_again: StoryFeedback = serde_json::from_value(v1_again.unwrap()).unwrap();
    assert_eq!(v1_again_calls.load(Ordering::SeqCst), 1);
    assert_eq!(v1_again.feedback[0].text, "recomputed evaluation");
}

#[tokio::test]
async fn missing_credentials_is_a_configuration_error() {
    let fixture = SyncFixture::new();

    let engine = story_sync_workflow(
        Arc::new(StubReader {
            text: "irrelevant".into(),
            calls: fixture.reader_calls.clone(),
        }),
        Arc::new(StubGenerator {
            kind: "Question",
            text: "irrelevant".into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        RetryPolicy::default(),
        DEFAULT_STORY_CRITERIA.to_string(),
    )
    .unwrap();

    let result = engine
        .run(
            &fixture.adapter,
            "TEST_STORY-9",
            Map::new(), // no credentials seeded
            CancellationToken::new(),
            ReviewEvent::story_changed("STORY-9", "v1", ChangeAction::Updated),
        )
        .await;
    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[tokio::test]
async fn cancellation_still_checkpoints_the_seeded_state() {
    let fixture = SyncFixture::new();

    let engine = story_sync_workflow(
        Arc::new(StubReader {
            text: "irrelevant".into(),
            calls: fixture.reader_calls.clone(),
        }),
        Arc::new(StubGenerator {
            kind: "Question",
            text: "irrelevant".into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        RetryPolicy::default(),
        DEFAULT_STORY_CRITERIA.to_string(),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = engine
        .run(
            &fixture.adapter,
            "TEST_STORY-1",
            credentials_seed(),
            cancel,
            ReviewEvent::story_changed("STORY-1", "v1", ChangeAction::Created),
        )
        .await;
    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert_eq!(fixture.reader_calls.load(Ordering::SeqCst), 0);

    // the run context was still written out
    let ctx = fixture.adapter.load("TEST_STORY-1", Map::new()).await.unwrap();
    let creds: Option<BacklogCredentials> = ctx.get(CREDENTIALS_KEY).await;
    assert!(creds.is_some());
}

#[tokio::test]
async fn document_review_is_idempotent_per_revision() {
    let adapter = RunPersistenceAdapter::new(Arc::new(MemorySnapshotStore::new()));
    let fetch_calls = Arc::new(AtomicUsize::new(0));
    let gen_calls = Arc::new(AtomicUsize::new(0));

    let run = |text: &str, fetch_calls: Arc<AtomicUsize>, gen_calls: Arc<AtomicUsize>| {
        document_review_workflow(
            Arc::new(StubGenerator {
                kind: "Recommendation",
                text: text.into(),
                calls: gen_calls,
            }),
            Arc::new(StubFetcher {
                content: "the document body".into(),
                calls: fetch_calls,
            }),
            RetryPolicy::default(),
            "Review as a Product Manager.".to_string(),
        )
        .unwrap()
    };

    let engine = run("add acceptance criteria", fetch_calls.clone(), gen_calls.clone());
    let event = ReviewEvent::document_updated(
        "file:///tmp/spec.md",
        recourse_foundation::Author::ProductManager,
        "r1",
    );

    let first = engine
        .run(
            &adapter,
            "docs_spec",
            Map::new(),
            CancellationToken::new(),
            event.clone(),
        )
        .await
        .unwrap();
    let feedback: Feedback = serde_json::from_value(first.clone()).unwrap();
    assert_eq!(feedback.kind, FeedbackKind::Recommendation);
    assert_eq!(feedback.text, "add acceptance criteria");
    assert_eq!(feedback.revision, "r1");
    assert_eq!(feedback.file_url.as_deref(), Some("file:///tmp/spec.md"));

    // a second engine with a different stub against the same run: the
    // cached feedback wins and neither collaborator is called again
    let second_fetch = Arc::new(AtomicUsize::new(0));
    let second_gen = Arc::new(AtomicUsize::new(0));
    let engine2 = run("different advice", second_fetch.clone(), second_gen.clone());
    let second = engine2
        .run(
            &adapter,
            "docs_spec",
            Map::new(),
            CancellationToken::new(),
            event,
        )
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gen_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_fetch.load(Ordering::SeqCst), 0);
    assert_eq!(second_gen.load(Ordering::SeqCst), 0);
}
