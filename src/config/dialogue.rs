//! Dialogue engine configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::{RetryPolicy, ThesisGatePolicy};
use crate::domain::synthesis::{InputSanitizer, MAX_MESSAGE_CHARS};

/// Retry, input and thesis gate settings
#[derive(Debug, Clone, Deserialize)]
pub struct DialogueConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum student message length in characters
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// How achievement claims that fail the thesis gate are treated
    #[serde(default)]
    pub thesis_gate: ThesisGatePolicy,
}

impl DialogueConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }

    pub fn sanitizer(&self) -> InputSanitizer {
        InputSanitizer::new().with_max_chars(self.max_message_chars)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_message_chars == 0 {
            return Err(ValidationError::InvalidMessageLimit);
        }
        Ok(())
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_message_chars: default_max_message_chars(),
            thesis_gate: ThesisGatePolicy::default(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_message_chars() -> usize {
    MAX_MESSAGE_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialogue_defaults() {
        let config = DialogueConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.sanitizer().max_chars(), 2000);
        assert_eq!(config.thesis_gate, ThesisGatePolicy::Advisory);
    }

    #[test]
    fn test_zero_message_limit_is_invalid() {
        let config = DialogueConfig {
            max_message_chars: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidMessageLimit)));
    }

    #[test]
    fn test_zero_retries_is_allowed() {
        let config = DialogueConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_policy().max_attempts(), 1);
    }
}
