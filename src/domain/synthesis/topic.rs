//! Topics and the active topic set of a synthesis session.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::foundation::{TopicId, ValidationError};

/// Fewest topics a synthesis session can weave together.
pub const MIN_TOPICS: usize = 2;

/// Most topics a synthesis session can weave together.
pub const MAX_TOPICS: usize = 4;

/// A concept the student has already mastered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
}

impl Topic {
    /// Creates a topic, rejecting a blank id or title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Result<Self, ValidationError> {
        let id = TopicId::new(id)?;
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::empty_field("title"));
        }
        Ok(Self { id, title })
    }
}

/// The 2–4 topics active for one dialogue session.
///
/// # Invariants
///
/// - Holds between [`MIN_TOPICS`] and [`MAX_TOPICS`] topics
/// - Topic ids are unique
/// - Order is the caller's order and is preserved (prompt output depends on it)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Topic>", into = "Vec<Topic>")]
pub struct TopicSet(Vec<Topic>);

impl TopicSet {
    /// Validates and wraps the given topics.
    pub fn new(topics: Vec<Topic>) -> Result<Self, ValidationError> {
        if topics.len() < MIN_TOPICS || topics.len() > MAX_TOPICS {
            return Err(ValidationError::out_of_range(
                "topics",
                MIN_TOPICS as i32,
                MAX_TOPICS as i32,
                topics.len() as i32,
            ));
        }

        let mut seen = HashSet::new();
        for topic in &topics {
            if topic.title.trim().is_empty() {
                return Err(ValidationError::empty_field("title"));
            }
            if !seen.insert(topic.id.as_str()) {
                return Err(ValidationError::invalid_format(
                    "topics",
                    format!("duplicate topic id '{}'", topic.id),
                ));
            }
        }

        Ok(Self(topics))
    }

    /// Returns the topics in session order.
    pub fn topics(&self) -> &[Topic] {
        &self.0
    }

    /// Iterates over the topic titles in session order.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|t| t.title.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; a valid set holds at least two topics.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<Topic>> for TopicSet {
    type Error = ValidationError;

    fn try_from(topics: Vec<Topic>) -> Result<Self, Self::Error> {
        Self::new(topics)
    }
}

impl From<TopicSet> for Vec<Topic> {
    fn from(set: TopicSet) -> Self {
        set.0
    }
}
