//! SubmitMessageHandler - Command handler for one student message in a session.
//!
//! Loads the session, runs a dialogue turn against it, applies the thesis gate
//! policy, records the exchange and persists. Turns for the same session are
//! serialized; different sessions proceed concurrently.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::application::dialogue::{DialogueClient, DialogueError, RetryPolicy};
use crate::domain::foundation::{DomainError, SessionId};
use crate::domain::synthesis::{InputSanitizer, SynthesisSession, ThesisGate, TurnResult};
use crate::ports::{NoPromptCache, PromptCache, StructuredGenerator, SynthesisSessionRepository};

/// How the handler treats an achievement claim that fails the thesis gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThesisGatePolicy {
    /// Persist the model's claim as-is; the failure is only logged.
    #[default]
    Advisory,
    /// Downgrade a failing claim to SPARRING before persisting.
    Enforcing,
}

impl FromStr for ThesisGatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "advisory" => Ok(ThesisGatePolicy::Advisory),
            "enforcing" => Ok(ThesisGatePolicy::Enforcing),
            other => Err(format!("unknown thesis gate policy: {}", other)),
        }
    }
}

/// Command to submit a student message.
#[derive(Debug, Clone)]
pub struct SubmitMessageCommand {
    pub session_id: SessionId,
    pub message: String,
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmitMessageResult {
    /// The session after the exchange was recorded.
    pub session: SynthesisSession,
    /// The turn as persisted (after any gate downgrade).
    pub turn: TurnResult,
    pub retries: u32,
    /// An achievement claim was rejected by the enforcing gate.
    pub downgraded: bool,
}

#[derive(Debug, Error)]
pub enum SubmitMessageError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session {0} is locked: thesis already achieved")]
    SessionLocked(SessionId),

    #[error(transparent)]
    Dialogue(#[from] DialogueError),

    #[error("repository error: {0}")]
    Repository(#[from] DomainError),
}

impl SubmitMessageError {
    /// Short, non-technical message safe to show the student.
    pub fn user_message(&self) -> String {
        match self {
            SubmitMessageError::SessionNotFound(_) => {
                "This session could not be found.".to_string()
            }
            SubmitMessageError::SessionLocked(_) => {
                "You've already completed this synthesis. Start a new session to keep going."
                    .to_string()
            }
            SubmitMessageError::Dialogue(err) => err.user_message(),
            SubmitMessageError::Repository(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

/// Handler for submitting a student message to a synthesis session.
pub struct SubmitMessageHandler {
    repository: Arc<dyn SynthesisSessionRepository>,
    generator: Arc<dyn StructuredGenerator>,
    prompt_cache: Arc<dyn PromptCache>,
    retry_policy: RetryPolicy,
    sanitizer: InputSanitizer,
    gate_policy: ThesisGatePolicy,
    session_locks: StdMutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SubmitMessageHandler {
    pub fn new(
        repository: Arc<dyn SynthesisSessionRepository>,
        generator: Arc<dyn StructuredGenerator>,
    ) -> Self {
        Self {
            repository,
            generator,
            prompt_cache: Arc::new(NoPromptCache),
            retry_policy: RetryPolicy::default(),
            sanitizer: InputSanitizer::new(),
            gate_policy: ThesisGatePolicy::default(),
            session_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: InputSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_gate_policy(mut self, gate_policy: ThesisGatePolicy) -> Self {
        self.gate_policy = gate_policy;
        self
    }

    pub fn with_prompt_cache(mut self, prompt_cache: Arc<dyn PromptCache>) -> Self {
        self.prompt_cache = prompt_cache;
        self
    }

    pub async fn handle(
        &self,
        cmd: SubmitMessageCommand,
    ) -> Result<SubmitMessageResult, SubmitMessageError> {
        // 1. Serialize turns for this session
        let lease = self.session_lease(cmd.session_id);
        let _guard = lease.lock.lock().await;

        // 2. Load session
        let mut session = self
            .repository
            .find_by_id(&cmd.session_id)
            .await?
            .ok_or(SubmitMessageError::SessionNotFound(cmd.session_id))?;

        // 3. Reject input once the thesis is achieved
        if session.is_locked() {
            return Err(SubmitMessageError::SessionLocked(cmd.session_id));
        }

        // 4. Run the turn
        let client = DialogueClient::new(
            self.generator.clone(),
            session.topics().clone(),
            session.proof_events(),
        )
        .with_retry_policy(self.retry_policy)
        .with_sanitizer(self.sanitizer.clone())
        .with_prompt_cache(self.prompt_cache.as_ref());

        let completed = client.run_turn(session.transcript(), &cmd.message).await?;

        // 5. Apply gate policy
        let (turn, downgraded) = self.apply_gate_policy(&session, completed.result);

        // 6. Record and persist
        session.record_exchange(completed.student_message, &turn)?;
        self.repository.save(&session).await?;

        if session.is_locked() {
            tracing::info!(session_id = %session.id(), "Thesis achieved; session locked");
        }

        Ok(SubmitMessageResult {
            session,
            turn,
            retries: completed.retries,
            downgraded,
        })
    }

    fn apply_gate_policy(&self, session: &SynthesisSession, turn: TurnResult) -> (TurnResult, bool) {
        if self.gate_policy != ThesisGatePolicy::Enforcing || !turn.is_thesis_achieved() {
            return (turn, false);
        }
        if ThesisGate::validate(&turn, session.topics()) {
            return (turn, false);
        }
        tracing::warn!(
            session_id = %session.id(),
            "Achievement claim failed thesis gate; downgrading to SPARRING"
        );
        (turn.downgrade_to_sparring(), true)
    }

    fn session_lease(&self, session_id: SessionId) -> SessionLease<'_> {
        let mut locks = self
            .session_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(session_id).or_default().clone();
        SessionLease {
            locks: &self.session_locks,
            session_id,
            lock,
        }
    }
}

/// A clone of one session's turn lock.
///
/// On drop the table entry is removed once no other submission holds or waits
/// on it, so the table only tracks sessions with turns in flight.
struct SessionLease<'a> {
    locks: &'a StdMutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    session_id: SessionId,
    lock: Arc<Mutex<()>>,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Table entry plus this lease: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.session_id);
        }
    }
}
