//! Response contract for model output and its strict parser.
//!
//! The backend is asked for a JSON object matching [`response_schema`]. Whatever
//! comes back is decoded and checked field by field, producing a distinct
//! [`SchemaViolation`] per problem so the caller can log precisely what the
//! model got wrong before retrying.

use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::loom_status::LoomStatus;
use super::turn_result::{TurnInvariantError, TurnResult};

pub const FIELD_SOCRATIC_RESPONSE: &str = "socratic_response";
pub const FIELD_LOOM_STATUS: &str = "loom_status";
pub const FIELD_CRYSTALLIZED_THREAD: &str = "crystallized_thread";
pub const FIELD_PROOF_OF_COGNITION: &str = "cryptographic_proof_of_cognition";

static RESPONSE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            FIELD_SOCRATIC_RESPONSE: {
                "type": "string",
                "description": "Your single Socratic question or redirect for the student."
            },
            FIELD_LOOM_STATUS: {
                "type": "string",
                "enum": LoomStatus::wire_values(),
                "description": "SPARRING while synthesis is incomplete; THESIS_ACHIEVED only when the student has related every topic."
            },
            FIELD_CRYSTALLIZED_THREAD: {
                "type": ["string", "null"],
                "description": "One sentence capturing a pairwise connection the student just articulated, or null."
            },
            FIELD_PROOF_OF_COGNITION: {
                "type": ["string", "null"],
                "description": "Trace of the student's reasoning naming every topic; non-null only with THESIS_ACHIEVED."
            }
        },
        "required": [
            FIELD_SOCRATIC_RESPONSE,
            FIELD_LOOM_STATUS,
            FIELD_CRYSTALLIZED_THREAD,
            FIELD_PROOF_OF_COGNITION
        ],
        "additionalProperties": false
    })
});

/// JSON Schema describing the turn contract, handed to the generation backend.
pub fn response_schema() -> &'static Value {
    &RESPONSE_SCHEMA
}

/// A decoded response that does not satisfy the turn contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("response is not a JSON object (got {actual})")]
    NotAnObject { actual: &'static str },

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid type for field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("illegal loom_status value: {value}")]
    IllegalStatus { value: String },

    #[error("socratic_response is empty")]
    EmptyResponse,

    #[error("invariant violated: {0}")]
    Invariant(TurnInvariantError),
}

impl From<TurnInvariantError> for SchemaViolation {
    fn from(err: TurnInvariantError) -> Self {
        match err {
            TurnInvariantError::EmptyResponse => SchemaViolation::EmptyResponse,
            other => SchemaViolation::Invariant(other),
        }
    }
}

/// Any reason a raw backend reply could not become a [`TurnResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResponseFormatError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("schema violation: {0}")]
    Schema(#[from] SchemaViolation),
}

/// Decodes and validates raw backend output into a [`TurnResult`].
///
/// # Steps
/// 1. Locate the JSON object (tolerating a code fence or prose preamble)
/// 2. Decode it
/// 3. Check each field's presence and type
/// 4. Enforce the status/proof/thread invariants
pub fn parse_turn_result(raw: &str) -> Result<TurnResult, ResponseFormatError> {
    let json_str = extract_json(raw);
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| ResponseFormatError::MalformedJson(e.to_string()))?;
    Ok(validate_turn_value(&value)?)
}

/// Validates an already-decoded value against the turn contract.
pub fn validate_turn_value(value: &Value) -> Result<TurnResult, SchemaViolation> {
    let object = value.as_object().ok_or(SchemaViolation::NotAnObject {
        actual: json_type_name(value),
    })?;

    let socratic_response = required_string(object, FIELD_SOCRATIC_RESPONSE)?;
    let status_value = required_string(object, FIELD_LOOM_STATUS)?;
    let loom_status = LoomStatus::from_wire(&status_value)
        .ok_or(SchemaViolation::IllegalStatus { value: status_value })?;
    let crystallized_thread = nullable_string(object, FIELD_CRYSTALLIZED_THREAD)?;
    let proof = nullable_string(object, FIELD_PROOF_OF_COGNITION)?;

    Ok(TurnResult::from_parts(
        socratic_response,
        loom_status,
        crystallized_thread,
        proof,
    )?)
}

fn required_string(object: &Map<String, Value>, field: &'static str) -> Result<String, SchemaViolation> {
    match object.get(field) {
        None => Err(SchemaViolation::MissingField { field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(SchemaViolation::TypeMismatch {
            field,
            expected: "string",
            actual: json_type_name(other),
        }),
    }
}

fn nullable_string(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, SchemaViolation> {
    match object.get(field) {
        None => Err(SchemaViolation::MissingField { field }),
        Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(SchemaViolation::TypeMismatch {
            field,
            expected: "string or null",
            actual: json_type_name(other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Finds the JSON object in a reply that may wrap it in a code fence or prose.
///
/// Falls back to the trimmed input, letting the decoder report the error.
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(inner) = extract_from_code_block(trimmed) {
        return inner;
    }

    match trimmed.find('{') {
        Some(start) => extract_balanced_object(trimmed, start).unwrap_or(trimmed),
        None => trimmed,
    }
}

fn extract_from_code_block(s: &str) -> Option<&str> {
    let patterns = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for pattern in patterns {
        if let Some(start) = s.find(pattern) {
            let body_start = start + pattern.len();
            if let Some(end) = s[body_start..].find("```") {
                return Some(s[body_start..body_start + end].trim());
            }
        }
    }
    None
}

fn extract_balanced_object(s: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, c) in s[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&s[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
