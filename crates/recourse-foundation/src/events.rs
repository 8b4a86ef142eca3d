//! Review pipeline events.
//!
//! The closed set of events the review workflows route on. Each variant
//! carries a creation timestamp and its kind-specific payload; events
//! are constructed fresh from a previous event's data plus new results,
//! never mutated.
//!
//! The kind tag is a separate enum so the engine's registration table
//! is exhaustive and checkable when the workflow is built — there is no
//! runtime type inspection anywhere on the dispatch path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use recourse_kernel::WorkflowEvent;

use crate::feedback::{Author, StoryFeedback};
use crate::model::Story;

/// Discriminant the engine routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewEventKind {
    DocumentUpdated,
    StoryChanged,
    StoryFetched,
    StoryEvaluated,
    ExportRequested,
}

/// What happened to a backlog item. Anything else is rejected at
/// deserialization, not at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

/// Immutable tagged payloads driving the review workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewEvent {
    /// A reviewed document changed; produced by the transport layer
    DocumentUpdated {
        file_url: String,
        author: Author,
        revision: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    /// A backlog item changed; produced by the transport layer
    StoryChanged {
        entity_id: String,
        revision: String,
        action: ChangeAction,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    /// The backlog item was fetched (or served from cache)
    StoryFetched {
        entity_id: String,
        revision: String,
        story: Story,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    /// The rubric evaluation is ready
    StoryEvaluated {
        entity_id: String,
        revision: String,
        feedback: StoryFeedback,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    /// Accumulated feedback should be written out
    ExportRequested {
        path: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl ReviewEvent {
    /// Document-updated event stamped with the current time
    pub fn document_updated(
        file_url: impl Into<String>,
        author: Author,
        revision: impl Into<String>,
    ) -> Self {
        Self::DocumentUpdated {
            file_url: file_url.into(),
            author,
            revision: revision.into(),
            timestamp: Utc::now(),
        }
    }

    /// Story-changed event stamped with the current time
    pub fn story_changed(
        entity_id: impl Into<String>,
        revision: impl Into<String>,
        action: ChangeAction,
    ) -> Self {
        Self::StoryChanged {
            entity_id: entity_id.into(),
            revision: revision.into(),
            action,
            timestamp: Utc::now(),
        }
    }

    /// Story-fetched event stamped with the current time
    pub fn story_fetched(
        entity_id: impl Into<String>,
        revision: impl Into<String>,
        story: Story,
    ) -> Self {
        Self::StoryFetched {
            entity_id: entity_id.into(),
            revision: revision.into(),
            story,
            timestamp: Utc::now(),
        }
    }

    /// Story-evaluated event stamped with the current time
    pub fn story_evaluated(
        entity_id: impl Into<String>,
        revision: impl Into<String>,
        feedback: StoryFeedback,
    ) -> Self {
        Self::StoryEvaluated {
            entity_id: entity_id.into(),
            revision: revision.into(),
            feedback,
            timestamp: Utc::now(),
        }
    }

    /// Export-requested event stamped with the current time
    pub fn export_requested(path: impl Into<String>) -> Self {
        Self::ExportRequested {
            path: path.into(),
            timestamp: Utc::now(),
        }
    }
}

impl WorkflowEvent for ReviewEvent {
    type Kind = ReviewEventKind;

    fn kind(&self) -> ReviewEventKind {
        match self {
            ReviewEvent::DocumentUpdated { .. } => ReviewEventKind::DocumentUpdated,
            ReviewEvent::StoryChanged { .. } => ReviewEventKind::StoryChanged,
            ReviewEvent::StoryFetched { .. } => ReviewEventKind::StoryFetched,
            ReviewEvent::StoryEvaluated { .. } => ReviewEventKind::StoryEvaluated,
            ReviewEvent::ExportRequested { .. } => ReviewEventKind::ExportRequested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_projection() {
        let ev = ReviewEvent::story_changed("STORY-1", "v1", ChangeAction::Created);
        assert_eq!(ev.kind(), ReviewEventKind::StoryChanged);

        let ev = ReviewEvent::export_requested("out/feedback.json");
        assert_eq!(ev.kind(), ReviewEventKind::ExportRequested);
    }

    #[test]
    fn test_serde_tagged_roundtrip() {
        let ev = ReviewEvent::document_updated("file:///tmp/spec.md", Author::ProductManager, "r7");
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["kind"], "document_updated");
        assert_eq!(v["file_url"], "file:///tmp/spec.md");

        let back: ReviewEvent = serde_json::from_value(v).unwrap();
        assert_eq!(back.kind(), ReviewEventKind::DocumentUpdated);
    }

    #[test]
    fn test_unknown_action_is_rejected_at_deserialization() {
        let result: Result<ReviewEvent, _> = serde_json::from_value(serde_json::json!({
            "kind": "story_changed",
            "entity_id": "STORY-1",
            "revision": "v1",
            "action": "archived"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let ev: ReviewEvent = serde_json::from_value(serde_json::json!({
            "kind": "story_changed",
            "entity_id": "STORY-1",
            "revision": "v1",
            "action": "created"
        }))
        .unwrap();
        let ReviewEvent::StoryChanged { timestamp, .. } = ev else {
            panic!("wrong variant");
        };
        assert!(Utc::now().signed_duration_since(timestamp).num_seconds() < 5);
    }
}
