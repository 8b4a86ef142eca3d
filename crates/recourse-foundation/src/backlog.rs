//! External backlog reader.
//!
//! [`BacklogReader`] fetches a [`Story`] by its backlog key.
//! [`HttpBacklogReader`] speaks the REST issue API with basic auth.
//! A missing item is [`EngineError::NotFound`] and aborts the step
//! immediately; rate limits, server errors, and network faults are
//! transient and go back through the retry executor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use recourse_kernel::{EngineError, EngineResult};

use crate::model::Story;

/// Credentials seeded into the run context before a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogCredentials {
    pub email: String,
    pub api_token: String,
    pub server_url: String,
}

/// Backlog fetch boundary.
#[async_trait]
pub trait BacklogReader: Send + Sync {
    /// Fetch the story identified by `story_id`
    async fn fetch_story(
        &self,
        credentials: &BacklogCredentials,
        story_id: &str,
    ) -> EngineResult<Story>;
}

/// REST-backed [`BacklogReader`].
pub struct HttpBacklogReader {
    client: reqwest::Client,
}

impl HttpBacklogReader {
    pub fn new() -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BacklogReader for HttpBacklogReader {
    async fn fetch_story(
        &self,
        credentials: &BacklogCredentials,
        story_id: &str,
    ) -> EngineResult<Story> {
        let url = format!(
            "{}/rest/api/2/issue/{}",
            credentials.server_url.trim_end_matches('/'),
            story_id
        );

        let resp = self
            .client
            .get(&url)
            .basic_auth(&credentials.email, Some(&credentials.api_token))
            .send()
            .await
            .map_err(|e| EngineError::transient(format!("backlog request failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::not_found(format!(
                "no story found for id {story_id}"
            )));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(EngineError::config(format!(
                "backlog rejected credentials for {}",
                credentials.email
            )));
        }
        if !status.is_success() {
            return Err(EngineError::transient(format!(
                "backlog returned status {status}"
            )));
        }

        let issue: IssueResponse = resp
            .json()
            .await
            .map_err(|e| EngineError::transient(format!("malformed backlog payload: {e}")))?;
        Ok(issue.into_story())
    }
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    comment: Option<CommentsBlock>,
}

#[derive(Debug, Deserialize)]
struct CommentsBlock {
    #[serde(default)]
    comments: Vec<IssueComment>,
}

#[derive(Debug, Deserialize)]
struct IssueComment {
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: Option<CommentAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommentAuthor {
    #[serde(rename = "displayName", default)]
    display_name: String,
}

impl IssueResponse {
    fn into_story(self) -> Story {
        let title = self.fields.summary.unwrap_or_else(|| "Story".to_string());
        let mut story = Story::new(self.key, title, "backlog");
        if let Some(description) = self.fields.description {
            story.push_revision(description, "backlog");
        }
        if let Some(block) = self.fields.comment {
            for comment in block.comments {
                let by = comment
                    .author
                    .map(|a| a.display_name)
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "backlog".to_string());
                story.add_comment(comment.body, by);
            }
        }
        story
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_mapping() {
        let issue: IssueResponse = serde_json::from_value(serde_json::json!({
            "key": "STORY-1",
            "fields": {
                "summary": "Platform Story Evaluation Feature",
                "description": "as a user I want X",
                "comment": {
                    "comments": [
                        {"body": "needs acceptance criteria", "author": {"displayName": "PM"}},
                        {"body": "agreed"}
                    ]
                }
            }
        }))
        .unwrap();

        let story = issue.into_story();
        assert_eq!(story.id, "STORY-1");
        assert_eq!(story.title, "Platform Story Evaluation Feature");
        assert_eq!(story.current_description().unwrap().text, "as a user I want X");
        assert_eq!(story.comments.len(), 2);
        assert_eq!(story.comments[0].updated_by, "PM");
        assert_eq!(story.comments[1].updated_by, "backlog");
    }

    #[test]
    fn test_issue_mapping_without_fields() {
        let issue: IssueResponse =
            serde_json::from_value(serde_json::json!({ "key": "STORY-2" })).unwrap();
        let story = issue.into_story();
        assert_eq!(story.title, "Story");
        assert!(story.current_description().is_none());
    }
}
