//! LoomStatus enum: the two-phase lifecycle of a synthesis dialogue.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Whether the student is still sparring or has woven a full thesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoomStatus {
    #[default]
    Sparring,
    ThesisAchieved,
}

impl LoomStatus {
    /// Wire value used in model responses.
    pub fn as_wire(&self) -> &'static str {
        match self {
            LoomStatus::Sparring => "SPARRING",
            LoomStatus::ThesisAchieved => "THESIS_ACHIEVED",
        }
    }

    /// Parses the exact wire value; anything else is rejected.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "SPARRING" => Some(LoomStatus::Sparring),
            "THESIS_ACHIEVED" => Some(LoomStatus::ThesisAchieved),
            _ => None,
        }
    }

    /// All legal wire values.
    pub fn wire_values() -> [&'static str; 2] {
        ["SPARRING", "THESIS_ACHIEVED"]
    }

    /// Returns true once further student input is locked.
    pub fn is_achieved(&self) -> bool {
        matches!(self, LoomStatus::ThesisAchieved)
    }
}

impl StateMachine for LoomStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (LoomStatus::Sparring, LoomStatus::ThesisAchieved))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            LoomStatus::Sparring => vec![LoomStatus::ThesisAchieved],
            LoomStatus::ThesisAchieved => vec![],
        }
    }
}

impl fmt::Display for LoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}
