//! Application handlers.
//!
//! Command handlers that orchestrate domain operations across ports.

mod submit_message;

pub use submit_message::{
    SubmitMessageCommand, SubmitMessageError, SubmitMessageHandler, SubmitMessageResult,
    ThesisGatePolicy,
};
