//! External generation service.
//!
//! [`GenerationProvider`] is the seam the workflow steps call through;
//! [`GeminiGenerator`] implements it against the Generative Language API
//! v1beta with structured JSON output. Any failure on the wire —
//! timeout, rate limit, non-success status, malformed payload — is
//! reported as transient so the kernel retry executor owns the retry
//! decision up to its attempt ceiling.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use recourse_kernel::{EngineError, EngineResult};

/// Structured-output generation boundary.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Producer identity recorded next to memoized results (e.g. the
    /// model name)
    fn name(&self) -> &str;

    /// Generate a value conforming to `output_schema` from `prompt`
    async fn generate(&self, prompt: &str, output_schema: &Value) -> EngineResult<Value>;
}

/// Gemini generator configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key
    pub api_key: String,
    /// Base URL (default: https://generativelanguage.googleapis.com)
    pub base_url: String,
    /// Model id, e.g. gemini-2.5-pro
    pub model: String,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-pro".to_string(),
            timeout_secs: 60,
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn from_env() -> Self {
        let mut cfg = Self {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            ..Default::default()
        };
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            cfg.model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            cfg.base_url = base_url;
        }
        cfg
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Gemini-backed [`GenerationProvider`].
pub struct GeminiGenerator {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>) -> EngineResult<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    pub fn from_env() -> EngineResult<Self> {
        Self::with_config(GeminiConfig::from_env())
    }

    pub fn with_config(config: GeminiConfig) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn map_error(e: reqwest::Error) -> EngineError {
        EngineError::transient(format!("generation request failed: {e}"))
    }
}

#[async_trait]
impl GenerationProvider for GeminiGenerator {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str, output_schema: &Value) -> EngineResult<Value> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseJsonSchema": output_schema,
            }
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        );

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_error)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Self::map_error)?;

        if !status.is_success() {
            return Err(EngineError::transient(format!(
                "generation returned status {status}: {text}"
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| EngineError::transient(format!("malformed generation payload: {e}")))?;
        let candidate_text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .ok_or_else(|| EngineError::transient("generation returned no candidates"))?;

        serde_json::from_str(strip_code_fences(&candidate_text))
            .map_err(|e| EngineError::transient(format!("generation output is not valid JSON: {e}")))
    }
}

/// Models occasionally wrap JSON mode output in markdown code blocks.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```json") {
        trimmed
            .strip_prefix("```json")
            .and_then(|s| s.strip_suffix("```"))
            .map(|s| s.trim())
            .unwrap_or(trimmed)
    } else if trimmed.starts_with("```") {
        trimmed
            .strip_prefix("```")
            .and_then(|s| s.strip_suffix("```"))
            .map(|s| s.trim())
            .unwrap_or(trimmed)
    } else {
        trimmed
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(
            strip_code_fences("```json\n{\"a\": 1}\n```"),
            "{\"a\": 1}"
        );
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_config_builders() {
        let cfg = GeminiConfig::new("key")
            .with_model("gemini-3.0-flash-preview")
            .with_base_url("http://localhost:9999/")
            .with_timeout(5);
        assert_eq!(cfg.model, "gemini-3.0-flash-preview");
        assert_eq!(cfg.base_url, "http://localhost:9999/");
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn test_candidate_payload_parsing() {
        let payload = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "{\"type\": \"Question\", \"text\": \"what is X?\"}"}]}
            }]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(payload).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.clone())
            .collect();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "Question");
    }
}
