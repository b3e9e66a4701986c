//! OpenAI adapter — chat-completion API with native function calling.
//!
//! Roles map one-to-one onto the wire: tool results travel as `role:"tool"`
//! turns correlated by `tool_call_id`, and tool descriptors pass through
//! verbatim as function declarations.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::llm::message::{ChatMessage, Role, ToolCall, ToolDefinition};
use crate::llm::{ChatProvider, CompletionRequest, NO_RESPONSE, ProviderReply, ToolChoice};

const PROVIDER: &str = "openai";
const API_URL: &str = "https://api.openai.com/v1/chat/completions";

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object, as the API ships it.
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize, Debug)]
struct WireChoice {
    message: WireMessage,
}

// ── Translation ─────────────────────────────────────────────────────

fn to_wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| match (m.role, &m.tool_call) {
            (Role::Assistant, Some(call)) => WireMessage {
                role: "assistant".into(),
                content: (!m.content.is_empty()).then(|| m.content.clone()),
                tool_calls: Some(vec![WireToolCall {
                    id: call.id.clone(),
                    kind: "function".into(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                }]),
                tool_call_id: None,
            },
            (Role::Tool, call) => WireMessage {
                role: "tool".into(),
                content: Some(m.content.clone()),
                tool_calls: None,
                tool_call_id: call.as_ref().map(|c| c.id.clone()),
            },
            (role, _) => WireMessage {
                role: match role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => unreachable!(),
                }
                .into(),
                content: Some(m.content.clone()),
                tool_calls: None,
                tool_call_id: None,
            },
        })
        .collect()
}

fn to_wire_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|t| WireTool {
            kind: "function",
            function: WireFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

/// Parse the first choice into a canonical reply. Extra tool calls in the
/// same turn are dropped (at-most-one policy) with a warning.
fn parse_reply(response: WireResponse) -> Result<ProviderReply, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: PROVIDER,
            reason: "response contained no choices".into(),
        })?;

    let text = choice.message.content.unwrap_or_default();

    let tool_call = match choice.message.tool_calls {
        Some(mut calls) if !calls.is_empty() => {
            if calls.len() > 1 {
                tracing::warn!(
                    dropped = calls.len() - 1,
                    "Backend returned multiple tool calls; honoring only the first"
                );
            }
            let first = calls.remove(0);
            // Tolerant parse: an unparsable argument string becomes a
            // non-object payload, which the registry reports as malformed
            // arguments rather than failing the whole turn.
            let arguments = serde_json::from_str(&first.function.arguments)
                .unwrap_or(serde_json::Value::String(first.function.arguments));
            Some(ToolCall::new(first.id, first.function.name, arguments))
        }
        _ => None,
    };

    let text = if text.is_empty() && tool_call.is_none() {
        NO_RESPONSE.to_string()
    } else {
        text
    };

    Ok(ProviderReply { text, tool_call })
}

/// Map an HTTP failure status to a provider error category.
fn map_status(status: reqwest::StatusCode, retry_after: Option<u64>, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Auth { provider: PROVIDER },
        429 => ProviderError::RateLimited {
            provider: PROVIDER,
            retry_after: retry_after.map(std::time::Duration::from_secs),
        },
        500..=599 => ProviderError::Transient {
            provider: PROVIDER,
            reason: format!("{status}: {body}"),
        },
        _ => ProviderError::Unknown {
            provider: PROVIDER,
            reason: format!("{status}: {body}"),
        },
    }
}

// ── Provider ────────────────────────────────────────────────────────

/// Completion-style provider over the OpenAI chat-completions API.
pub struct OpenAiProvider {
    api_key: SecretString,
    model: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: SecretString, model: &str) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<ProviderReply, ProviderError> {
        let has_tools = !request.tools.is_empty();
        let body = WireRequest {
            model: &self.model,
            messages: to_wire_messages(&request.messages),
            tools: has_tools.then(|| to_wire_tools(&request.tools)),
            tool_choice: has_tools.then(|| match request.tool_choice {
                ToolChoice::Auto => "auto",
                ToolChoice::None => "none",
            }),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transient {
                provider: PROVIDER,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, retry_after, body));
        }

        let wire: WireResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: PROVIDER,
                    reason: e.to_string(),
                })?;

        parse_reply(wire)
    }
}
