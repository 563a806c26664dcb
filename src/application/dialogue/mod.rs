//! Dialogue orchestration: one Socratic turn from raw student text to a
//! validated [`TurnResult`](crate::domain::synthesis::TurnResult).

mod client;
mod errors;
mod retry;

pub use client::{CompletedTurn, DialogueClient};
pub use errors::DialogueError;
pub use retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, DEFAULT_MAX_RETRY_AFTER};
