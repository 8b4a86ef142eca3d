//! Document content fetching.
//!
//! Reviewed documents are referenced by plain paths, `file://` URLs, or
//! `http(s)` URLs. A missing document is [`EngineError::NotFound`] —
//! never retried; network faults are transient.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;

use recourse_kernel::{EngineError, EngineResult};

/// Content fetch boundary.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the raw text behind `reference`
    async fn fetch(&self, reference: &str) -> EngineResult<String>;
}

/// Fetcher handling local paths, `file://` URLs, and `http(s)` URLs.
pub struct UrlContentFetcher {
    client: reqwest::Client,
}

impl UrlContentFetcher {
    pub fn new() -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &str) -> EngineResult<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::transient(format!("content request failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::not_found(url.to_string()));
        }
        if !status.is_success() {
            return Err(EngineError::transient(format!(
                "content fetch returned status {status}"
            )));
        }
        resp.text()
            .await
            .map_err(|e| EngineError::transient(format!("content read failed: {e}")))
    }

    async fn fetch_file(&self, path: &str) -> EngineResult<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(EngineError::not_found(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ContentFetcher for UrlContentFetcher {
    async fn fetch(&self, reference: &str) -> EngineResult<String> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            self.fetch_http(reference).await
        } else if let Some(path) = reference.strip_prefix("file://") {
            self.fetch_file(path).await
        } else {
            self.fetch_file(reference).await
        }
    }
}
