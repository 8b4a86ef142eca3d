//! Environment-driven service settings.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RECOURSE_ENVIRONMENT` | `development` | Deployment environment label. |
//! | `RECOURSE_PORT` | `5000` | TCP port to listen on. |
//! | `RECOURSE_PROJECT` | `RECOURSE` | Default project key for run identifiers. |
//! | `RECOURSE_SNAPSHOT_DIR` | `state` | Directory for run context snapshots. |
//! | `RECOURSE_PROMPT_PATH` | *(built-in)* | Reviewer prompt file. |
//! | `RECOURSE_CRITERIA_PATH` | *(built-in)* | Story rubric file. |
//! | `RECOURSE_REQUEST_TIMEOUT_SECS` | `120` | Per-request run deadline. |
//! | `CORS_ORIGINS` | *(any)* | Comma-separated allowed origins. |
//! | `CORS_ALLOW_CREDENTIALS` | `true` | Allow credentialed requests. |
//! | `CORS_ALLOW_METHODS` | `*` | Comma-separated allowed methods. |
//! | `CORS_ALLOW_HEADERS` | `*` | Comma-separated allowed headers. |
//! | `BACKLOG_EMAIL` / `BACKLOG_API_TOKEN` / `BACKLOG_SERVER_URL` | *(none)* | Backlog credentials; story sync is disabled unless all three are set. |
//!
//! Gemini configuration (`GEMINI_API_KEY`, `GEMINI_MODEL`,
//! `GEMINI_BASE_URL`) is read by the foundation provider itself.

use std::path::PathBuf;
use std::str::FromStr;

use recourse_foundation::BacklogCredentials;

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsSettings {
    /// Allowed origins; empty or `*` means any
    pub origins: Vec<String>,
    pub allow_credentials: bool,
    /// Allowed methods; `*` means any
    pub methods: Vec<String>,
    /// Allowed headers; `*` means any
    pub headers: Vec<String>,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            origins: Vec::new(),
            allow_credentials: true,
            methods: vec!["*".to_string()],
            headers: vec!["*".to_string()],
        }
    }
}

/// Runtime configuration for the gateway.
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub port: u16,
    /// Default project key used when a request does not name one
    pub project: String,
    pub snapshot_dir: PathBuf,
    pub prompt_path: Option<PathBuf>,
    pub criteria_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub cors: CorsSettings,
    pub backlog: Option<BacklogCredentials>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 5000,
            project: "RECOURSE".to_string(),
            snapshot_dir: PathBuf::from("state"),
            prompt_path: None,
            criteria_path: None,
            request_timeout_secs: 120,
            cors: CorsSettings::default(),
            backlog: None,
        }
    }
}

impl Settings {
    /// Read settings from environment variables, falling back to the
    /// documented defaults.
    pub fn from_env() -> Self {
        let backlog = match (
            env_opt("BACKLOG_EMAIL"),
            env_opt("BACKLOG_API_TOKEN"),
            env_opt("BACKLOG_SERVER_URL"),
        ) {
            (Some(email), Some(api_token), Some(server_url)) => Some(BacklogCredentials {
                email,
                api_token,
                server_url,
            }),
            _ => None,
        };

        Self {
            environment: env_opt("RECOURSE_ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),
            port: env_parse("RECOURSE_PORT", 5000),
            project: env_opt("RECOURSE_PROJECT").unwrap_or_else(|| "RECOURSE".to_string()),
            snapshot_dir: env_opt("RECOURSE_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("state")),
            prompt_path: env_opt("RECOURSE_PROMPT_PATH").map(PathBuf::from),
            criteria_path: env_opt("RECOURSE_CRITERIA_PATH").map(PathBuf::from),
            request_timeout_secs: env_parse("RECOURSE_REQUEST_TIMEOUT_SECS", 120),
            cors: CorsSettings {
                origins: env_list("CORS_ORIGINS", &[]),
                allow_credentials: env_parse("CORS_ALLOW_CREDENTIALS", true),
                methods: env_list("CORS_ALLOW_METHODS", &["*"]),
                headers: env_list("CORS_ALLOW_HEADERS", &["*"]),
            },
            backlog,
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env_opt(key) {
        Some(v) => split_list(&v),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port, 5000);
        assert_eq!(settings.project, "RECOURSE");
        assert_eq!(settings.request_timeout_secs, 120);
        assert!(settings.backlog.is_none());
        assert!(settings.cors.allow_credentials);
    }

    #[test]
    fn test_split_list_trims_and_drops_empties() {
        assert_eq!(
            split_list("http://a, http://b ,,"),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_env_list_default_applies_when_unset() {
        assert_eq!(
            env_list("RECOURSE_TEST_UNSET", &["*"]),
            vec!["*".to_string()]
        );
    }
}
