//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `synthesis` - Topics, turn contract, sanitizer, prompt, thesis gate and session aggregate

pub mod foundation;
pub mod synthesis;
