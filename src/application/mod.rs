//! Application layer - dialogue orchestration and command handlers.
//!
//! `dialogue` runs a single Socratic turn and knows nothing about persistence.
//! `handlers` wraps it with session loading, locking and saving.

pub mod dialogue;
pub mod handlers;

pub use dialogue::{CompletedTurn, DialogueClient, DialogueError, RetryPolicy};
pub use handlers::{
    SubmitMessageCommand, SubmitMessageError, SubmitMessageHandler, SubmitMessageResult,
    ThesisGatePolicy,
};
