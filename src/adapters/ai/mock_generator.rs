//! Mock structured generator for testing.
//!
//! Scripted stand-in for an LLM backend. Responses are consumed in order;
//! once the script runs out a fixed valid SPARRING turn is returned.
//!
//! # Example
//!
//! ```ignore
//! let generator = MockGenerator::new()
//!     .with_response("not json")
//!     .with_turn(&TurnResult::sparring("What links them?", None)?);
//!
//! let raw = generator.generate(request).await?;
//! assert_eq!(generator.call_count(), 1);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::synthesis::{TurnResult, TurnResultWire};
use crate::ports::{GenerationError, GenerationRequest, StructuredGenerator};

/// Raw text returned once the scripted responses are exhausted.
pub const DEFAULT_MOCK_RESPONSE: &str = r#"{"socratic_response":"What do you notice when you put these two ideas side by side?","loom_status":"SPARRING","crystallized_thread":null,"cryptographic_proof_of_cognition":null}"#;

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this raw text.
    Raw(String),
    /// Fail with this error.
    Error(GenerationError),
}

/// Scripted generator with call tracking.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    delay: Duration,
    calls: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues raw response text, valid or not.
    pub fn with_response(self, raw: impl Into<String>) -> Self {
        lock(&self.replies).push_back(MockReply::Raw(raw.into()));
        self
    }

    /// Queues a well-formed turn in its wire form.
    pub fn with_turn(self, turn: &TurnResult) -> Self {
        let wire = TurnResultWire::from(turn.clone());
        let raw = serde_json::to_string(&wire).unwrap_or_default();
        self.with_response(raw)
    }

    /// Queues an error.
    pub fn with_error(self, error: GenerationError) -> Self {
        lock(&self.replies).push_back(MockReply::Error(error));
        self
    }

    /// Queues the same reply `times` times.
    pub fn with_repeated(self, reply: MockReply, times: usize) -> Self {
        {
            let mut replies = lock(&self.replies);
            for _ in 0..times {
                replies.push_back(reply.clone());
            }
        }
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the number of generate calls made.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Returns all recorded requests.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        lock(&self.calls).clone()
    }

    fn next_reply(&self) -> MockReply {
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| MockReply::Raw(DEFAULT_MOCK_RESPONSE.to_string()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl StructuredGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        lock(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_reply() {
            MockReply::Raw(raw) => Ok(raw),
            MockReply::Error(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::TurnId;
    use crate::domain::synthesis::{parse_turn_result, LoomStatus, Message};
    use serde_json::json;

    fn request() -> GenerationRequest {
        GenerationRequest::new(TurnId::new(), "instruction", json!({}))
            .with_message(Message::student("hi"))
    }

    #[tokio::test]
    async fn returns_scripted_replies_in_order() {
        let generator = MockGenerator::new()
            .with_response("first")
            .with_error(GenerationError::rate_limited(None));

        assert_eq!(generator.generate(request()).await.unwrap(), "first");
        assert!(generator.generate(request()).await.unwrap_err().is_rate_limited());
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn default_reply_is_a_valid_sparring_turn() {
        let generator = MockGenerator::new();
        let raw = generator.generate(request()).await.unwrap();
        let turn = parse_turn_result(&raw).unwrap();
        assert_eq!(turn.loom_status(), LoomStatus::Sparring);
    }

    #[tokio::test]
    async fn with_turn_emits_wire_json() {
        let turn = TurnResult::thesis_achieved("Woven.", "A and B").unwrap();
        let generator = MockGenerator::new().with_turn(&turn);
        let raw = generator.generate(request()).await.unwrap();
        assert_eq!(parse_turn_result(&raw).unwrap(), turn);
    }

    #[tokio::test]
    async fn records_requests() {
        let generator = MockGenerator::new().with_repeated(MockReply::Raw("x".into()), 2);
        generator.generate(request()).await.unwrap();
        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].conversation[0].content, "hi");
        assert_eq!(generator.generate(request()).await.unwrap(), "x");
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn clones_share_script_and_history() {
        let generator = MockGenerator::new().with_response("shared");
        let clone = generator.clone();
        assert_eq!(clone.generate(request()).await.unwrap(), "shared");
        assert_eq!(generator.call_count(), 1);
        assert_eq!(generator.generate(request()).await.unwrap(), DEFAULT_MOCK_RESPONSE);
    }
}
