//! Reviewer feedback records.
//!
//! A [`Feedback`] is one structured remark a reviewer role produced
//! about a document or backlog item: a question or a recommendation,
//! with resolution flags and an append-only comment thread. Feedback is
//! never deleted; it only accumulates comments or flips exactly one
//! resolution flag.
//!
//! Identifiers and timestamps are stamped per instance by the
//! constructors — two records constructed back to back never share an
//! id or a creation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::model::Story;

/// Reviewer roles that can author feedback and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    Architect,
    #[serde(rename = "QA")]
    Qa,
    #[serde(rename = "QA Engineer")]
    QaEngineer,
    #[serde(rename = "Backend Engineer")]
    BackendEngineer,
    #[serde(rename = "Front End Engineer")]
    FrontEndEngineer,
    User,
    #[serde(rename = "VP of Engineering")]
    VpOfEngineering,
    #[serde(rename = "Product Manager")]
    ProductManager,
}

/// Classification of a feedback item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackKind {
    Question,
    Recommendation,
}

/// One comment in a feedback thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl Comment {
    /// Create a comment stamped with the current time
    pub fn new(author: Author, text: impl Into<String>) -> Self {
        Self {
            author,
            timestamp: Utc::now(),
            text: text.into(),
        }
    }
}

/// A structured reviewer remark targeting one source revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    pub id: Uuid,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub is_rejected: bool,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub text: String,
    /// Source revision this feedback targets
    pub revision: String,
    /// Reference to the reviewed document, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

impl Feedback {
    /// Create feedback with a fresh id and timestamp
    pub fn new(
        kind: FeedbackKind,
        author: Author,
        text: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            author,
            timestamp: Utc::now(),
            id: Uuid::new_v4(),
            is_resolved: false,
            is_rejected: false,
            is_approved: false,
            comments: Vec::new(),
            text: text.into(),
            revision: revision.into(),
            file_url: None,
        }
    }

    /// Attach the reviewed document reference
    pub fn with_file_url(mut self, file_url: impl Into<String>) -> Self {
        self.file_url = Some(file_url.into());
        self
    }

    /// Append a comment to the thread
    pub fn add_comment(&mut self, author: Author, text: impl Into<String>) {
        self.comments.push(Comment::new(author, text));
    }

    // Resolution flags are advisory, not mutually exclusive at the type
    // level; these setters keep at most one true.

    /// Mark resolved
    pub fn resolve(&mut self) {
        self.is_resolved = true;
        self.is_rejected = false;
        self.is_approved = false;
    }

    /// Mark rejected
    pub fn reject(&mut self) {
        self.is_resolved = false;
        self.is_rejected = true;
        self.is_approved = false;
    }

    /// Mark approved
    pub fn approve(&mut self) {
        self.is_resolved = false;
        self.is_rejected = false;
        self.is_approved = true;
    }

    /// JSON schema for structured generation of a feedback item.
    ///
    /// Only the fields the model fills in; author, revision, and file
    /// reference come from the triggering event.
    pub fn response_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["Question", "Recommendation"]
                },
                "text": {
                    "type": "string"
                }
            },
            "required": ["type", "text"]
        })
    }
}

/// Rubric evaluation of one backlog story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryFeedback {
    pub story: Story,
    #[serde(default)]
    pub feedback: Vec<Feedback>,
    pub updated_at: DateTime<Utc>,
    /// Identity of the producer (e.g. the model name)
    pub updated_by: String,
}

impl StoryFeedback {
    /// Create story feedback stamped with the current time
    pub fn new(story: Story, feedback: Vec<Feedback>, updated_by: impl Into<String>) -> Self {
        Self {
            story,
            feedback,
            updated_at: Utc::now(),
            updated_by: updated_by.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_id_and_timestamp_per_instance() {
        let a = Feedback::new(FeedbackKind::Question, Author::ProductManager, "a?", "v1");
        let b = Feedback::new(FeedbackKind::Question, Author::ProductManager, "b?", "v1");

        // constructed records never share an identifier
        assert_ne!(a.id, b.id);
        assert!(b.timestamp >= a.timestamp);
    }

    #[test]
    fn test_resolution_flags_keep_one_true() {
        let mut f = Feedback::new(
            FeedbackKind::Recommendation,
            Author::Qa,
            "split this story",
            "v1",
        );
        assert!(!f.is_resolved && !f.is_rejected && !f.is_approved);

        f.approve();
        assert!((f.is_approved as u8 + f.is_rejected as u8 + f.is_resolved as u8) == 1);

        f.reject();
        assert!(f.is_rejected && !f.is_approved && !f.is_resolved);

        f.resolve();
        assert!(f.is_resolved && !f.is_rejected && !f.is_approved);
    }

    #[test]
    fn test_comments_are_append_only_ordered() {
        let mut f = Feedback::new(FeedbackKind::Question, Author::ProductManager, "why?", "v1");
        f.add_comment(Author::User, "because of X");
        f.add_comment(Author::ProductManager, "then say so in the story");

        let texts: Vec<&str> = f.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["because of X", "then say so in the story"]);
    }

    #[test]
    fn test_serde_uses_original_wire_names() {
        let f = Feedback::new(
            FeedbackKind::Question,
            Author::QaEngineer,
            "what is X?",
            "v1",
        );
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["type"], "Question");
        assert_eq!(v["author"], "QA Engineer");

        let back: Feedback = serde_json::from_value(v).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn test_response_schema_names_the_generated_fields() {
        let schema = Feedback::response_schema();
        assert_eq!(schema["required"], serde_json::json!(["type", "text"]));
        assert_eq!(
            schema["properties"]["type"]["enum"],
            serde_json::json!(["Question", "Recommendation"])
        );
    }
}
