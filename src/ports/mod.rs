//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `StructuredGenerator` - Schema-constrained LLM generation
//! - `PromptCache` - Optional backend-side caching of the system instruction
//! - `SynthesisSessionRepository` - Session persistence

mod prompt_cache;
mod structured_generator;
mod synthesis_session_repository;

pub use prompt_cache::{CachedContextRef, NoPromptCache, PromptCache};
pub use structured_generator::{GenerationError, GenerationRequest, StructuredGenerator};
pub use synthesis_session_repository::SynthesisSessionRepository;
