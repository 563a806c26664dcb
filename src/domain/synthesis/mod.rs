//! Synthesis domain module.
//!
//! Everything the Socratic dialogue engine reasons about without I/O: the
//! active topics, historical evidence, the per-turn response contract and its
//! validator, input sanitization, the system instruction, the thesis gate and
//! the session aggregate.

mod loom_status;
mod message;
mod proof_event;
mod prompt;
mod response_schema;
mod sanitizer;
mod session;
mod thesis_gate;
mod topic;
mod turn_result;

pub use loom_status::LoomStatus;
pub use message::{Message, Role};
pub use proof_event::ProofEvent;
pub use prompt::{build_system_prompt, SystemPromptBuilder, NO_HISTORY_PLACEHOLDER};
pub use response_schema::{
    parse_turn_result, response_schema, validate_turn_value, ResponseFormatError,
    SchemaViolation,
};
pub use sanitizer::{InputError, InputSanitizer, SanitizedInput, INJECTION_PHRASES, MAX_MESSAGE_CHARS};
pub use session::{SynthesisSession, ThesisAchievement};
pub use thesis_gate::{ThesisCheck, ThesisGate};
pub use topic::{Topic, TopicSet, MAX_TOPICS, MIN_TOPICS};
pub use turn_result::{is_single_sentence, LoomOutcome, TurnInvariantError, TurnResult, TurnResultWire};
