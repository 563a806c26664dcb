//! Historical evidence that the student previously explained a concept.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// A stored record of the student explaining a concept in an earlier session.
///
/// Sourced from an external evidence store; the engine only reads it to
/// personalize the system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEvent {
    /// Concept the student was explaining.
    pub concept: String,
    /// Excerpt of the student's explanation.
    pub transcript_excerpt: String,
    /// Analogy the student authored, if any.
    #[serde(default)]
    pub student_analogy: Option<String>,
    pub timestamp: Timestamp,
}

impl ProofEvent {
    pub fn new(
        concept: impl Into<String>,
        transcript_excerpt: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            concept: concept.into(),
            transcript_excerpt: transcript_excerpt.into(),
            student_analogy: None,
            timestamp,
        }
    }

    /// Attaches the student's own analogy.
    pub fn with_analogy(mut self, analogy: impl Into<String>) -> Self {
        self.student_analogy = Some(analogy.into());
        self
    }

    /// Returns the analogy if present and not blank.
    pub fn analogy(&self) -> Option<&str> {
        self.student_analogy
            .as_deref()
            .filter(|a| !a.trim().is_empty())
    }
}
