//! Transcript entries exchanged between the student and the tutor.

use serde::{Deserialize, Serialize};

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The learner.
    Student,
    /// The Socratic tutor (model output).
    Ai,
}

/// One entry of the append-only transcript.
///
/// Ordering is significant and owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Creates a new message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a student message.
    pub fn student(content: impl Into<String>) -> Self {
        Self::new(Role::Student, content)
    }

    /// Creates a tutor message.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"student\"");
        assert_eq!(serde_json::to_string(&Role::Ai).unwrap(), "\"ai\"");
    }

    #[test]
    fn constructors_set_role() {
        assert!(Message::student("hi").is_student());
        assert!(!Message::ai("why?").is_student());
    }
}
