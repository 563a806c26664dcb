//! TurnResult - the validated outcome of one Socratic turn.
//!
//! On the wire a turn is a flat four-field object:
//!
//! ```json
//! {
//!   "socratic_response": "What would happen to the glucose if ...?",
//!   "loom_status": "SPARRING",
//!   "crystallized_thread": "Photosynthesis stores the energy respiration releases.",
//!   "cryptographic_proof_of_cognition": null
//! }
//! ```
//!
//! In memory the status-dependent fields live in a tagged [`LoomOutcome`], so a
//! proof of cognition cannot exist without thesis achievement and a crystallized
//! thread cannot ride along with one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::loom_status::LoomStatus;

/// Violations of the TurnResult invariants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnInvariantError {
    #[error("socratic_response must not be empty")]
    EmptyResponse,

    #[error("THESIS_ACHIEVED requires a non-empty proof of cognition")]
    MissingProof,

    #[error("proof of cognition is only allowed with THESIS_ACHIEVED")]
    UnexpectedProof,

    #[error("crystallized_thread is only allowed with SPARRING")]
    ThreadOnAchievement,

    #[error("crystallized_thread must be exactly one sentence")]
    ThreadNotOneSentence,
}

/// Status-dependent part of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoomOutcome {
    /// Dialogue continues; optionally a pairwise micro-connection was articulated.
    Sparring { crystallized_thread: Option<String> },
    /// The student synthesized every active topic.
    ThesisAchieved { proof_of_cognition: String },
}

/// The validated result of one Socratic turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TurnResultWire", into = "TurnResultWire")]
pub struct TurnResult {
    socratic_response: String,
    outcome: LoomOutcome,
}

impl TurnResult {
    /// Creates a sparring turn.
    pub fn sparring(
        socratic_response: impl Into<String>,
        crystallized_thread: Option<String>,
    ) -> Result<Self, TurnInvariantError> {
        let socratic_response = non_empty_response(socratic_response.into())?;
        if let Some(thread) = &crystallized_thread {
            if !is_single_sentence(thread) {
                return Err(TurnInvariantError::ThreadNotOneSentence);
            }
        }
        Ok(Self {
            socratic_response,
            outcome: LoomOutcome::Sparring { crystallized_thread },
        })
    }

    /// Creates a thesis-achieved turn.
    pub fn thesis_achieved(
        socratic_response: impl Into<String>,
        proof_of_cognition: impl Into<String>,
    ) -> Result<Self, TurnInvariantError> {
        let socratic_response = non_empty_response(socratic_response.into())?;
        let proof_of_cognition = proof_of_cognition.into();
        if proof_of_cognition.trim().is_empty() {
            return Err(TurnInvariantError::MissingProof);
        }
        Ok(Self {
            socratic_response,
            outcome: LoomOutcome::ThesisAchieved { proof_of_cognition },
        })
    }

    /// Assembles a turn from its flat wire fields, enforcing every invariant.
    pub fn from_parts(
        socratic_response: String,
        loom_status: LoomStatus,
        crystallized_thread: Option<String>,
        proof_of_cognition: Option<String>,
    ) -> Result<Self, TurnInvariantError> {
        match loom_status {
            LoomStatus::Sparring => {
                if proof_of_cognition.is_some() {
                    return Err(TurnInvariantError::UnexpectedProof);
                }
                Self::sparring(socratic_response, crystallized_thread)
            }
            LoomStatus::ThesisAchieved => {
                if crystallized_thread.is_some() {
                    return Err(TurnInvariantError::ThreadOnAchievement);
                }
                let proof = proof_of_cognition.ok_or(TurnInvariantError::MissingProof)?;
                Self::thesis_achieved(socratic_response, proof)
            }
        }
    }

    pub fn socratic_response(&self) -> &str {
        &self.socratic_response
    }

    pub fn outcome(&self) -> &LoomOutcome {
        &self.outcome
    }

    pub fn loom_status(&self) -> LoomStatus {
        match self.outcome {
            LoomOutcome::Sparring { .. } => LoomStatus::Sparring,
            LoomOutcome::ThesisAchieved { .. } => LoomStatus::ThesisAchieved,
        }
    }

    pub fn crystallized_thread(&self) -> Option<&str> {
        match &self.outcome {
            LoomOutcome::Sparring { crystallized_thread } => crystallized_thread.as_deref(),
            LoomOutcome::ThesisAchieved { .. } => None,
        }
    }

    pub fn proof_of_cognition(&self) -> Option<&str> {
        match &self.outcome {
            LoomOutcome::ThesisAchieved { proof_of_cognition } => Some(proof_of_cognition),
            LoomOutcome::Sparring { .. } => None,
        }
    }

    pub fn is_thesis_achieved(&self) -> bool {
        self.loom_status().is_achieved()
    }

    /// Drops an achievement claim, keeping the Socratic response.
    ///
    /// Used by callers that enforce the thesis gate instead of trusting the model.
    pub fn downgrade_to_sparring(self) -> Self {
        Self {
            socratic_response: self.socratic_response,
            outcome: LoomOutcome::Sparring {
                crystallized_thread: None,
            },
        }
    }
}

fn non_empty_response(response: String) -> Result<String, TurnInvariantError> {
    if response.trim().is_empty() {
        return Err(TurnInvariantError::EmptyResponse);
    }
    Ok(response)
}

/// Returns true if `text` reads as exactly one sentence.
///
/// A sentence terminator (`.`, `!`, `?`, optionally followed by closing quotes
/// or brackets) that is followed by whitespace and more text starts a second
/// sentence. Terminators inside tokens such as `3.14` do not.
pub fn is_single_sentence(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        while let Some(&next) = chars.peek() {
            if matches!(next, '.' | '!' | '?' | '"' | '\'' | ')' | '\u{201D}' | '\u{2019}') {
                chars.next();
            } else {
                break;
            }
        }
        if chars.peek().is_some_and(|next| next.is_whitespace()) {
            return false;
        }
    }
    true
}

/// Flat wire representation of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResultWire {
    pub socratic_response: String,
    pub loom_status: LoomStatus,
    pub crystallized_thread: Option<String>,
    pub cryptographic_proof_of_cognition: Option<String>,
}

impl TryFrom<TurnResultWire> for TurnResult {
    type Error = TurnInvariantError;

    fn try_from(wire: TurnResultWire) -> Result<Self, Self::Error> {
        TurnResult::from_parts(
            wire.socratic_response,
            wire.loom_status,
            wire.crystallized_thread,
            wire.cryptographic_proof_of_cognition,
        )
    }
}

impl From<TurnResult> for TurnResultWire {
    fn from(turn: TurnResult) -> Self {
        let loom_status = turn.loom_status();
        let (crystallized_thread, cryptographic_proof_of_cognition) = match turn.outcome {
            LoomOutcome::Sparring { crystallized_thread } => (crystallized_thread, None),
            LoomOutcome::ThesisAchieved { proof_of_cognition } => (None, Some(proof_of_cognition)),
        };
        Self {
            socratic_response: turn.socratic_response,
            loom_status,
            crystallized_thread,
            cryptographic_proof_of_cognition,
        }
    }
}
