//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - Structured generation backends (Anthropic, scripted mock)
//! - `session` - Session persistence (in-memory)

pub mod ai;
pub mod session;

pub use ai::{AnthropicConfig, AnthropicGenerator, MockGenerator};
pub use session::InMemorySessionRepository;
