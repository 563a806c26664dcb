//! Thesis validation gate.
//!
//! A shallow cross-check of an achievement claim: the proof of cognition must
//! exist and mention every active topic by title. It does not judge whether the
//! reasoning is sound.

use super::topic::{Topic, TopicSet};
use super::turn_result::TurnResult;

/// Outcome of checking one turn against the active topics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThesisCheck {
    /// The turn claimed achievement without a usable proof.
    pub missing_proof: bool,
    /// Topic titles the proof never mentions, in session order.
    pub missing_topics: Vec<String>,
}

impl ThesisCheck {
    pub fn is_valid(&self) -> bool {
        !self.missing_proof && self.missing_topics.is_empty()
    }
}

/// Cross-checks THESIS_ACHIEVED claims against the topic set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThesisGate;

impl ThesisGate {
    /// Returns the detailed check result.
    ///
    /// Sparring turns always pass.
    pub fn evaluate(turn: &TurnResult, topics: &TopicSet) -> ThesisCheck {
        Self::evaluate_topics(turn, topics.topics())
    }

    pub fn validate(turn: &TurnResult, topics: &TopicSet) -> bool {
        Self::evaluate(turn, topics).is_valid()
    }

    /// Same check over a plain topic slice, without the topic-set size rule.
    pub fn evaluate_topics(turn: &TurnResult, topics: &[Topic]) -> ThesisCheck {
        if !turn.is_thesis_achieved() {
            return ThesisCheck::default();
        }

        let titles = topics.iter().map(|t| t.title.as_str());

        let proof = match turn.proof_of_cognition() {
            Some(p) if !p.trim().is_empty() => p.to_lowercase(),
            _ => {
                return ThesisCheck {
                    missing_proof: true,
                    missing_topics: titles.map(str::to_string).collect(),
                }
            }
        };

        let missing_topics = titles
            .filter(|title| !proof.contains(&title.to_lowercase()))
            .map(str::to_string)
            .collect();

        ThesisCheck {
            missing_proof: false,
            missing_topics,
        }
    }

    pub fn validate_topics(turn: &TurnResult, topics: &[Topic]) -> bool {
        Self::evaluate_topics(turn, topics).is_valid()
    }
}
