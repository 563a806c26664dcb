//! SynthesisSession aggregate.
//!
//! Owns the transcript of one synthesis dialogue. The dialogue engine never
//! touches it; the application layer records each completed exchange here and
//! persists it.
//!
//! # Lifecycle
//!
//! Sessions start in SPARRING. A THESIS_ACHIEVED turn captures the final
//! outline and proof, then locks the session against further input.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::foundation::{DomainError, ErrorCode, SessionId, StateMachine, Timestamp};

use super::loom_status::LoomStatus;
use super::message::Message;
use super::proof_event::ProofEvent;
use super::topic::TopicSet;
use super::turn_result::TurnResult;

/// The persisted record of a completed synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThesisAchievement {
    /// Crystallized threads collected during sparring, in order.
    outline: Vec<String>,
    proof_of_cognition: String,
    /// SHA-256 hex digest binding the proof to its session.
    proof_digest: String,
    achieved_at: Timestamp,
}

impl ThesisAchievement {
    fn new(session_id: &SessionId, outline: Vec<String>, proof_of_cognition: String) -> Self {
        let proof_digest = Self::compute_digest(session_id, &proof_of_cognition);
        Self {
            outline,
            proof_of_cognition,
            proof_digest,
            achieved_at: Timestamp::now(),
        }
    }

    fn compute_digest(session_id: &SessionId, proof: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(session_id.to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(proof.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn outline(&self) -> &[String] {
        &self.outline
    }

    pub fn proof_of_cognition(&self) -> &str {
        &self.proof_of_cognition
    }

    pub fn proof_digest(&self) -> &str {
        &self.proof_digest
    }

    pub fn achieved_at(&self) -> &Timestamp {
        &self.achieved_at
    }

    /// Checks the stored digest against the proof text.
    pub fn verify(&self, session_id: &SessionId) -> bool {
        self.proof_digest == Self::compute_digest(session_id, &self.proof_of_cognition)
    }
}

/// Aggregate for one synthesis dialogue.
///
/// # Invariants
///
/// - `topics` never changes after creation
/// - `transcript` is append-only and alternates student / AI per exchange
/// - `achievement` is present iff `status` is THESIS_ACHIEVED
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisSession {
    id: SessionId,
    topics: TopicSet,
    proof_events: Vec<ProofEvent>,
    transcript: Vec<Message>,
    threads: Vec<String>,
    status: LoomStatus,
    achievement: Option<ThesisAchievement>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl SynthesisSession {
    /// Starts a new session in SPARRING.
    pub fn new(id: SessionId, topics: TopicSet, proof_events: Vec<ProofEvent>) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            topics,
            proof_events,
            transcript: Vec::new(),
            threads: Vec::new(),
            status: LoomStatus::Sparring,
            achievement: None,
            created_at: now,
            updated_at: now,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    pub fn proof_events(&self) -> &[ProofEvent] {
        &self.proof_events
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Crystallized threads collected so far.
    pub fn threads(&self) -> &[String] {
        &self.threads
    }

    pub fn status(&self) -> LoomStatus {
        self.status
    }

    pub fn achievement(&self) -> Option<&ThesisAchievement> {
        self.achievement.as_ref()
    }

    /// Returns true once the session accepts no more input.
    pub fn is_locked(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends one completed exchange.
    ///
    /// # Errors
    ///
    /// - `SessionLocked` if the thesis was already achieved
    /// - `InvalidStateTransition` if the status cannot advance
    pub fn record_exchange(
        &mut self,
        student_message: impl Into<String>,
        turn: &TurnResult,
    ) -> Result<(), DomainError> {
        self.ensure_unlocked()?;

        if turn.is_thesis_achieved() {
            self.status = self
                .status
                .transition_to(LoomStatus::ThesisAchieved)
                .map_err(|e| DomainError::new(ErrorCode::InvalidStateTransition, e.to_string()))?;
        }

        self.transcript.push(Message::student(student_message));
        self.transcript.push(Message::ai(turn.socratic_response()));

        if let Some(thread) = turn.crystallized_thread() {
            self.threads.push(thread.to_string());
        }

        if let Some(proof) = turn.proof_of_cognition() {
            self.achievement = Some(ThesisAchievement::new(
                &self.id,
                self.threads.clone(),
                proof.to_string(),
            ));
        }

        self.updated_at = Timestamp::now();
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<(), DomainError> {
        if self.is_locked() {
            return Err(DomainError::new(
                ErrorCode::SessionLocked,
                "Thesis already achieved; session accepts no further input",
            )
            .with_detail("session_id", self.id.to_string()));
        }
        Ok(())
    }
}
