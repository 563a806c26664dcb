//! State machine trait for status enums.
//!
//! Status enums with a fixed set of legal moves (such as the loom status of a
//! synthesis session) implement this trait and get validated transitions.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for LoomStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Sparring, ThesisAchieved))
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             Sparring => vec![ThesisAchieved],
///             ThesisAchieved => vec![],
///         }
///     }
/// }
///
/// let next = status.transition_to(LoomStatus::ThesisAchieved)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Gate {
        Open,
        Closed,
    }

    impl StateMachine for Gate {
        fn can_transition_to(&self, target: &Self) -> bool {
            matches!((self, target), (Gate::Open, Gate::Closed))
        }

        fn valid_transitions(&self) -> Vec<Self> {
            match self {
                Gate::Open => vec![Gate::Closed],
                Gate::Closed => vec![],
            }
        }
    }

    #[test]
    fn legal_move_returns_target() {
        assert_eq!(Gate::Open.transition_to(Gate::Closed), Ok(Gate::Closed));
    }

    #[test]
    fn illegal_move_is_rejected_with_both_states_named() {
        let err = Gate::Closed.transition_to(Gate::Open).unwrap_err();
        assert!(err.to_string().contains("Closed"));
        assert!(err.to_string().contains("Open"));
    }

    #[test]
    fn state_without_moves_is_terminal() {
        assert!(Gate::Closed.is_terminal());
        assert!(!Gate::Open.is_terminal());
    }
}
