//! Anthropic Generator - StructuredGenerator over Anthropic's Messages API.
//!
//! Structured output is obtained by declaring a single tool whose
//! `input_schema` is the response schema and forcing the model to call it.
//! The tool input is returned as raw JSON text for the engine to validate.
//!
//! # Configuration
//!
//! ```ignore
//! let config = AnthropicConfig::new(Secret::new(api_key))
//!     .with_model("claude-sonnet-4-20250514")
//!     .with_timeout(Duration::from_secs(60));
//!
//! let generator = AnthropicGenerator::new(config)?;
//! ```
//!
//! No retries happen here; the dialogue client owns retry policy.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::domain::synthesis::{Message, Role};
use crate::ports::{GenerationError, GenerationRequest, StructuredGenerator};

/// Name of the forced tool carrying the structured turn.
pub const TURN_TOOL_NAME: &str = "submit_socratic_turn";

/// Anthropic API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Placeholder user turn when a conversation would otherwise open with the tutor.
const OPENING_PLACEHOLDER: &str = "(The student joins the conversation.)";

/// Configuration for the Anthropic generator.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    api_key: Secret<String>,
    /// Model to use (e.g., "claude-sonnet-4-20250514").
    pub model: String,
    /// Base URL for the API (default: https://api.anthropic.com).
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum tokens to generate per turn.
    pub max_tokens: u32,
}

impl AnthropicConfig {
    pub fn new(api_key: Secret<String>) -> Self {
        Self {
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(60),
            max_tokens: 1024,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Anthropic Messages API generator.
pub struct AnthropicGenerator {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicGenerator {
    /// Creates a generator with its own HTTP client.
    pub fn new(config: AnthropicConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Converts our request to Anthropic's format.
    fn to_anthropic_request(&self, request: &GenerationRequest) -> Result<AnthropicRequest, GenerationError> {
        let messages = shape_messages(&request.conversation);
        if messages.is_empty() {
            return Err(GenerationError::InvalidRequest("conversation is empty".to_string()));
        }

        let cache_control = request
            .cached_context
            .as_ref()
            .map(|_| CacheControl::ephemeral());

        Ok(AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: vec![SystemBlock {
                block_type: "text",
                text: request.system_instruction.clone(),
                cache_control,
            }],
            messages,
            tools: vec![ToolDefinition {
                name: TURN_TOOL_NAME,
                description: "Submit the Socratic turn for the student.",
                input_schema: request.schema.clone(),
            }],
            tool_choice: ToolChoice {
                choice_type: "tool",
                name: TURN_TOOL_NAME,
            },
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::timeout(self.config.timeout.as_secs() as u32)
        } else if e.is_connect() {
            GenerationError::network(format!("Connection failed: {}", e))
        } else {
            GenerationError::network(e.to_string())
        }
    }

    /// Parses the API response status and handles errors.
    async fn handle_response_status(&self, response: Response) -> Result<Response, GenerationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let error_body = response.text().await.unwrap_or_default();

        Err(classify_status(
            status,
            retry_after,
            self.config.timeout.as_secs() as u32,
            error_body,
        ))
    }
}

#[async_trait]
impl StructuredGenerator for AnthropicGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let body = self.to_anthropic_request(&request)?;
        tracing::debug!(turn_id = %request.turn_id, model = %self.config.model, "Sending Anthropic request");

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = self.handle_response_status(response).await?;

        let parsed: AnthropicResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_send_error(e)
            } else {
                GenerationError::protocol(format!("Failed to parse response: {}", e))
            }
        })?;

        extract_output(parsed)
    }
}

/// Maps our transcript onto Anthropic's strictly alternating user/assistant turns.
///
/// Consecutive same-role messages are merged, and a placeholder user turn is
/// prepended if the transcript opens with the tutor.
fn shape_messages(conversation: &[Message]) -> Vec<AnthropicMessage> {
    let mut messages: Vec<AnthropicMessage> = Vec::with_capacity(conversation.len() + 1);

    for msg in conversation {
        let role = match msg.role {
            Role::Student => "user",
            Role::Ai => "assistant",
        };
        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&msg.content);
            }
            _ => messages.push(AnthropicMessage {
                role: role.to_string(),
                content: msg.content.clone(),
            }),
        }
    }

    if messages.first().is_some_and(|m| m.role == "assistant") {
        messages.insert(
            0,
            AnthropicMessage {
                role: "user".to_string(),
                content: OPENING_PLACEHOLDER.to_string(),
            },
        );
    }

    messages
}

/// Classifies a non-success HTTP status.
///
/// 408 and 504 are reported as timeouts: the request may have been processed.
fn classify_status(
    status: StatusCode,
    retry_after: Option<u32>,
    timeout_secs: u32,
    error_body: String,
) -> GenerationError {
    match status.as_u16() {
        401 | 403 => GenerationError::AuthenticationFailed,
        429 => GenerationError::rate_limited(retry_after),
        400 => GenerationError::InvalidRequest(error_body),
        408 | 504 => GenerationError::timeout(timeout_secs),
        500..=599 => GenerationError::unavailable(format!("Server error {}: {}", status, error_body)),
        _ => GenerationError::protocol(format!("Unexpected status {}: {}", status, error_body)),
    }
}

/// Parses a `retry-after` header given in whole seconds.
fn parse_retry_after(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

/// Pulls the structured turn out of a Messages API response.
///
/// Prefers the forced tool call; falls back to text blocks so the engine's
/// parser can still recover JSON from prose.
fn extract_output(response: AnthropicResponse) -> Result<String, GenerationError> {
    if response.stop_reason.as_deref() == Some("refusal") {
        return Err(GenerationError::content_filtered("model refused to respond"));
    }

    let mut text = String::new();
    for block in response.content {
        match block {
            ContentBlock::ToolUse { name, input } if name == TURN_TOOL_NAME => {
                return serde_json::to_string(&input)
                    .map_err(|e| GenerationError::protocol(format!("Failed to encode tool input: {}", e)));
            }
            ContentBlock::Text { text: t } => text.push_str(&t),
            _ => {}
        }
    }

    if text.trim().is_empty() {
        return Err(GenerationError::protocol("response contained no tool call or text"));
    }
    Ok(text)
}

// ----- Anthropic API Types -----

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: Vec<SystemBlock>,
    messages: Vec<AnthropicMessage>,
    tools: Vec<ToolDefinition>,
    tool_choice: ToolChoice,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    control_type: &'static str,
}

impl CacheControl {
    fn ephemeral() -> Self {
        Self {
            control_type: "ephemeral",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ToolDefinition {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: &'static str,
    name: &'static str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::TurnId;
    use crate::ports::CachedContextRef;
    use serde_json::json;

    fn generator() -> AnthropicGenerator {
        AnthropicGenerator::new(AnthropicConfig::new(Secret::new("test-key".to_string()))).unwrap()
    }

    fn request(conversation: Vec<Message>) -> GenerationRequest {
        GenerationRequest::new(TurnId::new(), "Be Socratic", json!({"type": "object"}))
            .with_conversation(conversation)
    }

    #[test]
    fn config_builder_works() {
        let config = AnthropicConfig::new(Secret::new("test-key".to_string()))
            .with_model("claude-3-haiku-20240307")
            .with_base_url("https://custom.api.com")
            .with_timeout(Duration::from_secs(30))
            .with_max_tokens(512);

        assert_eq!(config.model, "claude-3-haiku-20240307");
        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn config_debug_redacts_key() {
        let config = AnthropicConfig::new(Secret::new("sk-ant-secret".to_string()));
        assert!(!format!("{:?}", config).contains("sk-ant-secret"));
    }

    #[test]
    fn messages_url_handles_trailing_slash() {
        let generator = AnthropicGenerator::new(
            AnthropicConfig::new(Secret::new("k".to_string())).with_base_url("http://localhost:9000/"),
        )
        .unwrap();
        assert_eq!(generator.messages_url(), "http://localhost:9000/v1/messages");
    }

    #[test]
    fn request_forces_turn_tool_with_schema() {
        let body = generator()
            .to_anthropic_request(&request(vec![Message::student("hi")]))
            .unwrap();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["tool_choice"], json!({"type": "tool", "name": TURN_TOOL_NAME}));
        assert_eq!(json["tools"][0]["input_schema"], json!({"type": "object"}));
        assert_eq!(json["system"][0]["text"], "Be Socratic");
        assert!(json["system"][0].get("cache_control").is_none());
        assert_eq!(json["messages"][0], json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn cached_context_marks_system_block() {
        let req = request(vec![Message::student("hi")])
            .with_cached_context(Some(CachedContextRef::new("ctx")));
        let body = generator().to_anthropic_request(&req).unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"][0]["cache_control"], json!({"type": "ephemeral"}));
    }

    #[test]
    fn empty_conversation_is_rejected() {
        let result = generator().to_anthropic_request(&request(vec![]));
        assert!(matches!(result, Err(GenerationError::InvalidRequest(_))));
    }

    #[test]
    fn shape_merges_consecutive_roles() {
        let shaped = shape_messages(&[
            Message::student("one"),
            Message::student("two"),
            Message::ai("why?"),
            Message::student("three"),
        ]);
        assert_eq!(shaped.len(), 3);
        assert_eq!(shaped[0].content, "one\n\ntwo");
        assert_eq!(shaped[1].role, "assistant");
    }

    #[test]
    fn shape_prepends_user_when_tutor_opens() {
        let shaped = shape_messages(&[Message::ai("Welcome"), Message::student("hi")]);
        assert_eq!(shaped.len(), 3);
        assert_eq!(shaped[0].role, "user");
        assert_eq!(shaped[0].content, OPENING_PLACEHOLDER);
    }

    #[test]
    fn classify_status_maps_errors() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, None, 60, String::new()),
            GenerationError::AuthenticationFailed
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(7), 60, String::new()),
            GenerationError::rate_limited(Some(7))
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, 60, "bad".into()),
            GenerationError::InvalidRequest(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::from_u16(529).unwrap(), None, 60, "overloaded".into()),
            GenerationError::Unavailable { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::IM_A_TEAPOT, None, 60, String::new()),
            GenerationError::Protocol(_)
        ));
    }

    #[test]
    fn gateway_timeouts_are_classified_as_timeouts() {
        let request_timeout = classify_status(StatusCode::REQUEST_TIMEOUT, None, 45, String::new());
        assert_eq!(request_timeout, GenerationError::timeout(45));
        assert!(request_timeout.is_timeout());

        let gateway_timeout =
            classify_status(StatusCode::GATEWAY_TIMEOUT, None, 45, "upstream".into());
        assert_eq!(gateway_timeout, GenerationError::timeout(45));
        assert!(!gateway_timeout.is_rate_limited());
    }

    #[test]
    fn parse_retry_after_reads_seconds() {
        assert_eq!(parse_retry_after("12"), Some(12));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn extract_output_prefers_tool_input() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Thinking..."},
                {"type": "tool_use", "id": "toolu_1", "name": TURN_TOOL_NAME,
                 "input": {"socratic_response": "Why?", "loom_status": "SPARRING",
                           "crystallized_thread": null, "cryptographic_proof_of_cognition": null}}
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        let raw = extract_output(response).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["loom_status"], "SPARRING");
    }

    #[test]
    fn extract_output_falls_back_to_text() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "{\"a\": 1}"}],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert_eq!(extract_output(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn extract_output_rejects_empty_content() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "content": [{"type": "thinking", "thinking": "..."}],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert!(matches!(extract_output(response), Err(GenerationError::Protocol(_))));
    }

    #[test]
    fn extract_output_maps_refusal() {
        let response: AnthropicResponse = serde_json::from_value(json!({
            "content": [],
            "stop_reason": "refusal"
        }))
        .unwrap();
        assert!(matches!(
            extract_output(response),
            Err(GenerationError::ContentFiltered { .. })
        ));
    }
}
