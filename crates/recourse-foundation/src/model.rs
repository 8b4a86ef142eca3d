//! Backlog item model.
//!
//! A [`Story`] carries an ordered sequence of content revisions and an
//! ordered sequence of comments. Revisions are versioned; the current
//! content is the description with the highest version number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One versioned content revision of a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub text: String,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl Description {
    /// Create a revision stamped with the current time
    pub fn new(text: impl Into<String>, version: u32, updated_by: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            version,
            updated_at: Utc::now(),
            updated_by: updated_by.into(),
        }
    }
}

/// One comment on a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryComment {
    pub text: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl StoryComment {
    /// Create a comment stamped with the current time
    pub fn new(text: impl Into<String>, updated_by: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            updated_at: Utc::now(),
            updated_by: updated_by.into(),
        }
    }
}

/// A backlog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// Backlog key, e.g. "STORY-1"
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: Vec<Description>,
    #[serde(default)]
    pub comments: Vec<StoryComment>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl Story {
    /// Create an empty story stamped with the current time
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        updated_by: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: Vec::new(),
            comments: Vec::new(),
            updated_at: Utc::now(),
            updated_by: updated_by.into(),
        }
    }

    /// Append a new content revision.
    ///
    /// The version is always one past the current highest, so versions
    /// are monotonically increasing regardless of insertion history.
    pub fn push_revision(&mut self, text: impl Into<String>, updated_by: impl Into<String>) {
        let next = self.content.iter().map(|d| d.version).max().unwrap_or(0) + 1;
        let updated_by = updated_by.into();
        self.updated_at = Utc::now();
        self.updated_by = updated_by.clone();
        self.content.push(Description::new(text, next, updated_by));
    }

    /// Append a comment
    pub fn add_comment(&mut self, text: impl Into<String>, updated_by: impl Into<String>) {
        self.comments.push(StoryComment::new(text, updated_by));
    }

    /// The description with the highest version, if any
    pub fn current_description(&self) -> Option<&Description> {
        self.content.iter().max_by_key(|d| d.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_monotonic() {
        let mut story = Story::new("STORY-1", "Evaluate stories", "author");
        story.push_revision("first", "author");
        story.push_revision("second", "author");
        story.push_revision("third", "editor");

        let versions: Vec<u32> = story.content.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(story.updated_by, "editor");
    }

    #[test]
    fn test_current_description_is_highest_version() {
        let mut story = Story::new("STORY-1", "Evaluate stories", "author");
        assert!(story.current_description().is_none());

        story.push_revision("old", "author");
        story.push_revision("new", "author");

        let current = story.current_description().unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.text, "new");
    }

    #[test]
    fn test_comments_preserve_order() {
        let mut story = Story::new("STORY-1", "Evaluate stories", "author");
        story.add_comment("first comment", "user");
        story.add_comment("second comment", "pm");

        let texts: Vec<&str> = story.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first comment", "second comment"]);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut story = Story::new("STORY-1", "Evaluate stories", "author");
        story.push_revision("as a user I want X", "author");

        let v = serde_json::to_value(&story).unwrap();
        let back: Story = serde_json::from_value(v).unwrap();
        assert_eq!(back, story);
    }
}
