//! Structured Generator Port - the single capability the dialogue engine needs
//! from an LLM backend.
//!
//! Given the conversation so far, a system instruction and a JSON schema, the
//! backend returns raw text that should decode to a schema-conforming object.
//! The engine parses and validates that text itself; adapters only move bytes
//! and classify failures.
//!
//! # Example
//!
//! ```ignore
//! use async_trait::async_trait;
//!
//! struct EchoGenerator;
//!
//! #[async_trait]
//! impl StructuredGenerator for EchoGenerator {
//!     async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
//!         Ok(r#"{"socratic_response":"Why?","loom_status":"SPARRING",
//!                "crystallized_thread":null,"cryptographic_proof_of_cognition":null}"#.into())
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use super::prompt_cache::CachedContextRef;
use crate::domain::foundation::TurnId;
use crate::domain::synthesis::Message;

/// Port for schema-constrained generation.
///
/// Implementations must not retry on their own; retry policy belongs to the
/// dialogue client.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Produce raw response text for the given conversation.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Everything a backend needs for one generation attempt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Turn this attempt belongs to, for tracing.
    pub turn_id: TurnId,
    /// Transcript plus the new student message, oldest first.
    pub conversation: Vec<Message>,
    /// Session-wide system instruction.
    pub system_instruction: String,
    /// JSON Schema the response must satisfy.
    pub schema: Value,
    /// Opaque handle to a backend-side cached context, if any.
    pub cached_context: Option<CachedContextRef>,
}

impl GenerationRequest {
    /// Creates a request with an empty conversation.
    pub fn new(turn_id: TurnId, system_instruction: impl Into<String>, schema: Value) -> Self {
        Self {
            turn_id,
            conversation: Vec::new(),
            system_instruction: system_instruction.into(),
            schema,
            cached_context: None,
        }
    }

    /// Replaces the conversation.
    pub fn with_conversation(mut self, conversation: Vec<Message>) -> Self {
        self.conversation = conversation;
        self
    }

    /// Appends one message to the conversation.
    pub fn with_message(mut self, message: Message) -> Self {
        self.conversation.push(message);
        self
    }

    /// Attaches a cached context handle.
    pub fn with_cached_context(mut self, cached: Option<CachedContextRef>) -> Self {
        self.cached_context = cached;
        self
    }
}

/// Generation backend errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Backend refused the request due to rate limiting.
    #[error("rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited {
        /// Seconds until retry is allowed, when the backend says.
        retry_after_secs: Option<u32>,
    },

    /// Request exceeded the configured deadline.
    #[error("request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout.
        timeout_secs: u32,
    },

    /// Backend is unavailable (5xx, overloaded).
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// API key rejected.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Backend rejected the request as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Content was blocked by a safety filter.
    #[error("content filtered: {reason}")]
    ContentFiltered {
        /// Reason for filtering.
        reason: String,
    },

    /// Backend replied with something the adapter could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

fn retry_hint(retry_after_secs: &Option<u32>) -> String {
    match retry_after_secs {
        Some(secs) => format!(": retry after {}s", secs),
        None => String::new(),
    }
}

impl GenerationError {
    /// Creates a rate limited error.
    pub fn rate_limited(retry_after_secs: Option<u32>) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_secs: u32) -> Self {
        Self::Timeout { timeout_secs }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a content filtered error.
    pub fn content_filtered(reason: impl Into<String>) -> Self {
        Self::ContentFiltered {
            reason: reason.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns true for transient rate limiting, the only retried backend failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GenerationError::Timeout { .. })
    }
}
