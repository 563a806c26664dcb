//! Structured generator adapters.
//!
//! Implementations of the StructuredGenerator port.
//!
//! ## Available Adapters
//!
//! - `MockGenerator` - Scripted stub backend for tests and offline runs
//! - `AnthropicGenerator` - Anthropic Messages API with a forced tool call

mod anthropic_generator;
mod mock_generator;

pub use anthropic_generator::{AnthropicConfig, AnthropicGenerator, TURN_TOOL_NAME};
pub use mock_generator::{MockGenerator, MockReply, DEFAULT_MOCK_RESPONSE};
