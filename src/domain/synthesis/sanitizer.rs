//! Input sanitization for untrusted student messages.
//!
//! Student text is spliced into a conversation with an LLM, so anything that
//! could read as an instruction to the model is stripped before it leaves the
//! process: code, markup, role markers and well-known injection phrases.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Default maximum length of a sanitized student message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Literal phrases removed case-insensitively from student input.
pub const INJECTION_PHRASES: [&str; 5] = [
    "ignore previous instructions",
    "disregard all previous",
    "forget everything",
    "new instructions:",
    "system:",
];

static FENCED_CODE: Lazy<Regex> = Lazy::new(|| compile(r"(?s)```.*?```"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| compile(r"`[^`]*`"));
static TAGS: Lazy<Regex> = Lazy::new(|| compile(r"<[^<>]*>"));
static ROLE_MARKERS: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)\[\s*(?:SYSTEM|ASSISTANT|USER|AI)\s*\]"));
static PHRASES: Lazy<Regex> = Lazy::new(|| {
    let alternation = INJECTION_PHRASES
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    compile(&format!("(?i)(?:{alternation})"))
});
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| compile(r"\n{3,}"));

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        // Patterns are compile-time literals covered by the tests below.
        Err(e) => panic!("invalid sanitizer pattern {pattern:?}: {e}"),
    }
}

/// Errors for student input that cannot be sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Your message is empty. Please write something before sending.")]
    Empty,

    #[error("Your message is too long ({actual} characters, maximum {max}).")]
    TooLong { max: usize, actual: usize },
}

/// A sanitized message plus whether it was cut to fit the limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedInput {
    pub text: String,
    pub was_truncated: bool,
    /// Length in characters after stripping, before truncation.
    pub original_chars: usize,
}

/// Cleans raw student messages before they reach the model.
#[derive(Debug, Clone)]
pub struct InputSanitizer {
    max_chars: usize,
}

impl Default for InputSanitizer {
    fn default() -> Self {
        Self {
            max_chars: MAX_MESSAGE_CHARS,
        }
    }
}

impl InputSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the character limit.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Sanitizes a student message, returning only the cleaned text.
    pub fn sanitize(&self, raw: &str) -> Result<String, InputError> {
        self.sanitize_with_report(raw).map(|input| input.text)
    }

    /// Sanitizes a student message.
    ///
    /// # Steps
    /// 1. Strip code, tags, role markers and injection phrases until nothing changes
    /// 2. Collapse runs of 3+ newlines to 2
    /// 3. Trim, rejecting an empty result
    /// 4. Truncate to the character limit
    pub fn sanitize_with_report(&self, raw: &str) -> Result<SanitizedInput, InputError> {
        let cleaned = self.scrub(raw);
        if cleaned.is_empty() {
            return Err(InputError::Empty);
        }

        let original_chars = cleaned.chars().count();
        if original_chars <= self.max_chars {
            return Ok(SanitizedInput {
                text: cleaned,
                was_truncated: false,
                original_chars,
            });
        }

        tracing::warn!(
            original_chars,
            max_chars = self.max_chars,
            "Student message truncated"
        );
        Ok(SanitizedInput {
            text: cleaned.chars().take(self.max_chars).collect(),
            was_truncated: true,
            original_chars,
        })
    }

    /// Applies the stripping steps without the empty check or truncation.
    ///
    /// Used for other student-authored text that ends up in a prompt.
    pub fn scrub(&self, raw: &str) -> String {
        let mut current = raw.replace("\r\n", "\n");
        loop {
            let next = strip_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        EXCESS_NEWLINES
            .replace_all(&current, "\n\n")
            .trim()
            .to_string()
    }

    /// Fast-fail precheck on the raw message.
    pub fn validate(&self, raw: &str) -> Result<(), InputError> {
        if raw.trim().is_empty() {
            return Err(InputError::Empty);
        }
        let actual = raw.chars().count();
        if actual > self.max_chars {
            return Err(InputError::TooLong {
                max: self.max_chars,
                actual,
            });
        }
        Ok(())
    }
}

fn strip_once(s: &str) -> String {
    let s = FENCED_CODE.replace_all(s, "");
    let s = INLINE_CODE.replace_all(&s, "");
    let s = TAGS.replace_all(&s, "");
    let s = ROLE_MARKERS.replace_all(&s, "");
    PHRASES.replace_all(&s, "").into_owned()
}
