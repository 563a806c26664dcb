//! Dialogue error taxonomy.

use thiserror::Error;

use crate::domain::synthesis::InputError;
use crate::ports::GenerationError;

/// Terminal failure of one dialogue turn.
///
/// Display output is for logs. Use [`DialogueError::user_message`] for
/// anything shown to the student.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogueError {
    /// The student's message was empty after sanitization.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    /// Backend kept rate limiting past the retry ceiling.
    #[error("service busy after {retries} retries")]
    ServiceBusy { retries: u32 },

    /// Backend did not answer in time.
    #[error("generation timed out")]
    Timeout,

    /// Backend kept returning unparseable or invalid output past the retry ceiling.
    #[error("malformed output after {retries} retries: {reason}")]
    MalformedOutput { retries: u32, reason: String },

    /// Any other backend failure.
    #[error("unclassified generation failure: {0}")]
    Unclassified(GenerationError),
}

impl DialogueError {
    /// Short, non-technical message safe to show the student.
    pub fn user_message(&self) -> String {
        match self {
            DialogueError::InvalidInput(err) => err.to_string(),
            DialogueError::ServiceBusy { .. } => {
                "The tutor is busy right now. Please try again in a moment.".to_string()
            }
            DialogueError::Timeout => {
                "The tutor took too long to respond. Your progress is saved, please try again."
                    .to_string()
            }
            DialogueError::MalformedOutput { .. } => {
                "The tutor returned an invalid response format. Please try again.".to_string()
            }
            DialogueError::Unclassified(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    /// Retries spent before giving up, for the retried failure kinds.
    pub fn retries(&self) -> Option<u32> {
        match self {
            DialogueError::ServiceBusy { retries } | DialogueError::MalformedOutput { retries, .. } => {
                Some(*retries)
            }
            _ => None,
        }
    }
}
