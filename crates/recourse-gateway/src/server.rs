//! Axum-based HTTP gateway server.
//!
//! [`ReviewServer`] wires the three workflow engines, the persistence
//! adapter, and the CORS layer into a running axum service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check — always `200 OK`. |
//! | `GET`  | `/openapi.json` | The service's OpenAPI document. |
//! | `POST` | `/v1/documents/review` | Review a changed document. |
//! | `POST` | `/v1/stories/{id}/sync` | Sync and score a backlog story. |
//! | `POST` | `/v1/feedback/export` | Export a run's feedback to a file. |

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use recourse_foundation::review::{
    load_text_or_default, CREDENTIALS_KEY, DEFAULT_REVIEWER_PROMPT, DEFAULT_STORY_CRITERIA,
};
use recourse_foundation::{
    document_review_workflow, feedback_export_workflow, story_sync_workflow, Author, ChangeAction,
    ContentFetcher, GeminiGenerator, GenerationProvider, HttpBacklogReader, ReviewEvent,
    UrlContentFetcher,
};
use recourse_kernel::{
    EngineResult, FileSnapshotStore, RetryPolicy, RunPersistenceAdapter, WorkflowEngine,
};

use crate::error::{ApiError, ApiResult};
use crate::openapi;
use crate::settings::{CorsSettings, Settings};

// ─────────────────────────────────────────────────────────────────────────────
// Shared application state
// ─────────────────────────────────────────────────────────────────────────────

/// Shared state injected into every axum handler via [`State`] extractor.
#[derive(Clone)]
pub struct AppState {
    pub document_review: Arc<WorkflowEngine<ReviewEvent>>,
    pub story_sync: Arc<WorkflowEngine<ReviewEvent>>,
    pub feedback_export: Arc<WorkflowEngine<ReviewEvent>>,
    pub adapter: RunPersistenceAdapter,
    pub settings: Arc<Settings>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ReviewServer
// ─────────────────────────────────────────────────────────────────────────────

/// High-level server encapsulating workflow construction and the HTTP
/// surface.
pub struct ReviewServer {
    settings: Settings,
}

impl ReviewServer {
    /// Create a new server from the given configuration.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Build the axum [`Router`] with production collaborators (Gemini
    /// generation, REST backlog, file snapshots). Call
    /// [`start()`](Self::start) to bind and serve.
    pub fn build_app(&self) -> EngineResult<Router> {
        let provider: Arc<dyn GenerationProvider> = Arc::new(GeminiGenerator::from_env()?);
        let fetcher: Arc<dyn ContentFetcher> = Arc::new(UrlContentFetcher::new()?);
        let reader = Arc::new(HttpBacklogReader::new()?);

        let prompt = load_text_or_default(
            self.settings.prompt_path.as_deref(),
            DEFAULT_REVIEWER_PROMPT,
        );
        let criteria = load_text_or_default(
            self.settings.criteria_path.as_deref(),
            DEFAULT_STORY_CRITERIA,
        );
        let policy = RetryPolicy::default();

        let state = AppState {
            document_review: Arc::new(document_review_workflow(
                provider.clone(),
                fetcher,
                policy.clone(),
                prompt,
            )?),
            story_sync: Arc::new(story_sync_workflow(reader, provider, policy, criteria)?),
            feedback_export: Arc::new(feedback_export_workflow()?),
            adapter: RunPersistenceAdapter::new(Arc::new(FileSnapshotStore::new(
                &self.settings.snapshot_dir,
            ))),
            settings: Arc::new(self.settings.clone()),
        };
        Ok(Self::router(state))
    }

    /// Build the router over an already-constructed state (used by
    /// tests to inject stub collaborators).
    pub fn router(state: AppState) -> Router {
        let cors = cors_layer(&state.settings.cors);
        Router::new()
            .route("/health", get(health_handler))
            .route("/openapi.json", get(openapi_handler))
            .route("/v1/documents/review", post(review_document_handler))
            .route("/v1/stories/{id}/sync", post(sync_story_handler))
            .route("/v1/feedback/export", post(export_feedback_handler))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state)
    }

    /// Bind the server to `0.0.0.0:{port}` and serve until the process
    /// exits.
    pub async fn start(self) -> std::io::Result<()> {
        let port = self.settings.port;
        let app = self.build_app().map_err(std::io::Error::other)?;
        let addr = format!("0.0.0.0:{port}");
        info!(addr = %addr, "recourse gateway starting");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await
    }
}

fn cors_layer(cors: &CorsSettings) -> CorsLayer {
    let any_origin = cors.origins.is_empty() || cors.origins.iter().any(|o| o == "*");

    let origin = if any_origin {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            cors.origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok()),
        )
    };
    let methods = if cors.methods.iter().any(|m| m == "*") {
        AllowMethods::any()
    } else {
        AllowMethods::list(
            cors.methods
                .iter()
                .filter_map(|m| m.parse::<Method>().ok()),
        )
    };
    let headers = if cors.headers.iter().any(|h| h == "*") {
        AllowHeaders::any()
    } else {
        AllowHeaders::list(
            cors.headers
                .iter()
                .filter_map(|h| h.parse::<header::HeaderName>().ok()),
        )
    };

    let mut layer = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .expose_headers([header::LOCATION])
        .max_age(Duration::from_secs(600));

    // the wildcard origin cannot be combined with credentials
    if cors.allow_credentials && !any_origin {
        layer = layer.allow_credentials(true);
    }
    layer
}

/// Arm a cancellation token that fires when the request deadline
/// passes. The run observes it at its next suspension point and still
/// checkpoints whatever was committed before.
fn deadline_token(timeout_secs: u64) -> CancellationToken {
    let token = CancellationToken::new();
    let armed = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        armed.cancel();
    });
    token
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// `GET /health` — liveness probe.
async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "recourse-gateway" }))
}

/// `GET /openapi.json` — the authored OpenAPI document.
async fn openapi_handler() -> Json<Value> {
    Json(openapi::document())
}

#[derive(Debug, Deserialize)]
struct DocumentReviewRequest {
    file_url: String,
    author: Author,
    revision: String,
}

/// `POST /v1/documents/review` — turn the request into a
/// document-updated event and run the review workflow.
async fn review_document_handler(
    State(state): State<AppState>,
    Json(req): Json<DocumentReviewRequest>,
) -> ApiResult<Json<Value>> {
    if req.file_url.trim().is_empty() {
        return Err(ApiError::InvalidRequest("file_url must not be empty".into()));
    }

    let run_id = RunPersistenceAdapter::run_key("docs", &req.file_url);
    let event = ReviewEvent::document_updated(&req.file_url, req.author, &req.revision);
    let feedback = state
        .document_review
        .run(
            &state.adapter,
            &run_id,
            Map::new(),
            deadline_token(state.settings.request_timeout_secs),
            event,
        )
        .await?;
    Ok(Json(json!({ "run_id": run_id, "feedback": feedback })))
}

#[derive(Debug, Deserialize)]
struct StorySyncRequest {
    revision: String,
    action: ChangeAction,
    #[serde(default)]
    project: Option<String>,
}

/// `POST /v1/stories/{id}/sync` — turn the request into a story-changed
/// event and run the sync workflow, seeding backlog credentials.
async fn sync_story_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StorySyncRequest>,
) -> ApiResult<Json<Value>> {
    let creds = state.settings.backlog.clone().ok_or_else(|| {
        ApiError::Engine(recourse_kernel::EngineError::config(
            "backlog credentials are not configured",
        ))
    })?;

    let project = req.project.unwrap_or_else(|| state.settings.project.clone());
    let run_id = RunPersistenceAdapter::run_key(&project, &id);

    let mut seed = Map::new();
    seed.insert(
        CREDENTIALS_KEY.to_string(),
        serde_json::to_value(creds).map_err(recourse_kernel::EngineError::from)?,
    );

    let event = ReviewEvent::story_changed(&id, &req.revision, req.action);
    let feedback = state
        .story_sync
        .run(
            &state.adapter,
            &run_id,
            seed,
            deadline_token(state.settings.request_timeout_secs),
            event,
        )
        .await?;
    Ok(Json(json!({ "run_id": run_id, "feedback": feedback })))
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    run_id: String,
    #[serde(default = "default_export_path")]
    path: String,
}

fn default_export_path() -> String {
    "feedback.json".to_string()
}

/// `POST /v1/feedback/export` — write a run's accumulated feedback out.
async fn export_feedback_handler(
    State(state): State<AppState>,
    Json(req): Json<ExportRequest>,
) -> ApiResult<Json<Value>> {
    let summary = state
        .feedback_export
        .run(
            &state.adapter,
            &req.run_id,
            Map::new(),
            deadline_token(state.settings.request_timeout_secs),
            ReviewEvent::export_requested(&req.path),
        )
        .await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use recourse_kernel::{EngineResult, MemorySnapshotStore};
    use tower::util::ServiceExt;

    struct CannedGenerator;

    #[async_trait]
    impl GenerationProvider for CannedGenerator {
        fn name(&self) -> &str {
            "canned-model"
        }

        async fn generate(&self, _prompt: &str, _schema: &Value) -> EngineResult<Value> {
            Ok(json!({ "type": "Question", "text": "what is X?" }))
        }
    }

    struct CannedFetcher;

    #[async_trait]
    impl ContentFetcher for CannedFetcher {
        async fn fetch(&self, _reference: &str) -> EngineResult<String> {
            Ok("document body".to_string())
        }
    }

    fn stub_state() -> AppState {
        let provider: Arc<dyn GenerationProvider> = Arc::new(CannedGenerator);
        let policy = RetryPolicy::default();
        AppState {
            document_review: Arc::new(
                document_review_workflow(
                    provider.clone(),
                    Arc::new(CannedFetcher),
                    policy.clone(),
                    DEFAULT_REVIEWER_PROMPT.to_string(),
                )
                .unwrap(),
            ),
            story_sync: Arc::new(
                story_sync_workflow(
                    Arc::new(HttpBacklogReader::new().unwrap()),
                    provider,
                    policy,
                    DEFAULT_STORY_CRITERIA.to_string(),
                )
                .unwrap(),
            ),
            feedback_export: Arc::new(feedback_export_workflow().unwrap()),
            adapter: RunPersistenceAdapter::new(Arc::new(MemorySnapshotStore::new())),
            settings: Arc::new(Settings::default()),
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = ReviewServer::router(stub_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_openapi_endpoint() {
        let app = ReviewServer::router(stub_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_document_review_roundtrip() {
        let app = ReviewServer::router(stub_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/documents/review")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({
                            "file_url": "file:///tmp/spec.md",
                            "author": "Product Manager",
                            "revision": "r1"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["feedback"]["type"], "Question");
        assert_eq!(body["feedback"]["text"], "what is X?");
    }

    #[tokio::test]
    async fn test_story_sync_without_credentials_is_client_fault() {
        let app = ReviewServer::router(stub_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/stories/STORY-1/sync")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "revision": "v1", "action": "created" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
