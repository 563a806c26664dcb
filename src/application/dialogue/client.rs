//! DialogueClient - orchestrates one Socratic turn.
//!
//! # Turn state machine
//!
//! ```text
//! SANITIZE -> GENERATE -> PARSE -> VALIDATE -> (THESIS_CHECK) -> RETURN
//!                ^                     |
//!                +---- backoff --------+  (rate limit, malformed output)
//! ```
//!
//! A client is built once per session and holds no mutable state, so it can be
//! shared across tasks. It never touches the transcript; callers append the
//! returned sanitized message and response themselves.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::Instrument;

use super::errors::DialogueError;
use super::retry::RetryPolicy;
use crate::domain::foundation::TurnId;
use crate::domain::synthesis::{
    parse_turn_result, response_schema, InputSanitizer, Message, ProofEvent, ResponseFormatError,
    SystemPromptBuilder, ThesisGate, TopicSet, TurnResult,
};
use crate::ports::{
    CachedContextRef, GenerationError, GenerationRequest, PromptCache, StructuredGenerator,
};

/// A successful turn plus what the caller needs to record it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTurn {
    pub turn_id: TurnId,
    /// The sanitized student message exactly as it was sent to the backend.
    pub student_message: String,
    pub result: TurnResult,
    /// Retries spent before success.
    pub retries: u32,
    /// The student message was cut to the length limit.
    pub was_truncated: bool,
}

/// Per-session dialogue orchestrator.
pub struct DialogueClient {
    generator: Arc<dyn StructuredGenerator>,
    topics: TopicSet,
    sanitizer: InputSanitizer,
    retry_policy: RetryPolicy,
    system_instruction: String,
    schema: Value,
    cached_context: Option<CachedContextRef>,
}

/// A failure that the retry loop may try again.
enum RetryableFailure {
    RateLimited(GenerationError),
    Format(ResponseFormatError),
}

impl RetryableFailure {
    fn into_terminal(self, retries: u32) -> DialogueError {
        match self {
            RetryableFailure::RateLimited(_) => DialogueError::ServiceBusy { retries },
            RetryableFailure::Format(err) => DialogueError::MalformedOutput {
                retries,
                reason: err.to_string(),
            },
        }
    }

    /// Server-requested wait before the next attempt, if any.
    fn retry_after(&self) -> Option<Duration> {
        match self {
            RetryableFailure::RateLimited(GenerationError::RateLimited {
                retry_after_secs: Some(secs),
            }) => Some(Duration::from_secs(u64::from(*secs))),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            RetryableFailure::RateLimited(err) => err.to_string(),
            RetryableFailure::Format(err) => err.to_string(),
        }
    }
}

impl DialogueClient {
    /// Builds a client for one session, rendering the system instruction once.
    pub fn new(
        generator: Arc<dyn StructuredGenerator>,
        topics: TopicSet,
        proof_events: &[ProofEvent],
    ) -> Self {
        let system_instruction = SystemPromptBuilder::new().build(&topics, proof_events);
        Self {
            generator,
            topics,
            sanitizer: InputSanitizer::new(),
            retry_policy: RetryPolicy::default(),
            system_instruction,
            schema: response_schema().clone(),
            cached_context: None,
        }
    }

    /// Sets the retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets the input sanitizer.
    pub fn with_sanitizer(mut self, sanitizer: InputSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Looks up a cached context handle once; it is sent with every request.
    pub fn with_prompt_cache(mut self, cache: &dyn PromptCache) -> Self {
        self.cached_context = cache.lookup(&self.system_instruction, &self.schema);
        self
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Runs one turn and returns only the validated result.
    pub async fn submit_turn(
        &self,
        transcript: &[Message],
        raw_message: &str,
    ) -> Result<TurnResult, DialogueError> {
        self.run_turn(transcript, raw_message)
            .await
            .map(|completed| completed.result)
    }

    /// Runs one turn: sanitize, generate with retries, parse and validate.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the message is empty after sanitization (no backend call)
    /// - `ServiceBusy` if rate limiting outlasts the retry ceiling
    /// - `Timeout` on the first backend timeout (not retried)
    /// - `MalformedOutput` if invalid output outlasts the retry ceiling
    /// - `Unclassified` for any other backend failure (not retried)
    pub async fn run_turn(
        &self,
        transcript: &[Message],
        raw_message: &str,
    ) -> Result<CompletedTurn, DialogueError> {
        let turn_id = TurnId::new();
        let span = tracing::info_span!("dialogue_turn", %turn_id);
        self.run_turn_inner(turn_id, transcript, raw_message)
            .instrument(span)
            .await
    }

    async fn run_turn_inner(
        &self,
        turn_id: TurnId,
        transcript: &[Message],
        raw_message: &str,
    ) -> Result<CompletedTurn, DialogueError> {
        let sanitized = self.sanitizer.sanitize_with_report(raw_message)?;

        let mut conversation = transcript.to_vec();
        conversation.push(Message::student(sanitized.text.clone()));
        let request = GenerationRequest::new(turn_id, self.system_instruction.clone(), self.schema.clone())
            .with_conversation(conversation)
            .with_cached_context(self.cached_context.clone());

        let mut attempt: u32 = 0;
        loop {
            tracing::debug!(attempt, "Requesting structured generation");

            let failure = match self.generator.generate(request.clone()).await {
                Ok(raw) => match parse_turn_result(&raw) {
                    Ok(result) => {
                        self.check_thesis(&result);
                        tracing::debug!(
                            attempt,
                            loom_status = %result.loom_status(),
                            "Turn completed"
                        );
                        return Ok(CompletedTurn {
                            turn_id,
                            student_message: sanitized.text,
                            result,
                            retries: attempt,
                            was_truncated: sanitized.was_truncated,
                        });
                    }
                    Err(err) => RetryableFailure::Format(err),
                },
                Err(err) if err.is_rate_limited() => RetryableFailure::RateLimited(err),
                Err(err) if err.is_timeout() => {
                    tracing::error!(attempt, error = %err, "Generation timed out");
                    return Err(DialogueError::Timeout);
                }
                Err(err) => {
                    tracing::error!(attempt, error = %err, "Generation failed");
                    return Err(DialogueError::Unclassified(err));
                }
            };

            if attempt >= self.retry_policy.max_retries {
                tracing::error!(
                    retries = attempt,
                    reason = %failure.describe(),
                    "Retry ceiling reached"
                );
                return Err(failure.into_terminal(attempt));
            }

            let delay = self
                .retry_policy
                .delay_with_hint(attempt, failure.retry_after());
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %failure.describe(),
                "Retrying turn"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Logs a warning if an achievement claim fails the thesis gate.
    ///
    /// Advisory only: the model's status is returned unchanged.
    fn check_thesis(&self, result: &TurnResult) {
        if !result.is_thesis_achieved() {
            return;
        }
        let check = ThesisGate::evaluate(result, &self.topics);
        if !check.is_valid() {
            tracing::warn!(
                missing_proof = check.missing_proof,
                missing_topics = ?check.missing_topics,
                "ThesisValidationWarning: proof of cognition does not cover every topic"
            );
        }
    }
}
