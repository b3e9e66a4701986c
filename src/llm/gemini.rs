//! Gemini adapter — generative-content API with function-call parts.
//!
//! This backend has no system role in the turn list: every `System` message
//! folds into a single `systemInstruction` field, assistant turns become
//! `model`, and a tool result travels as a synthetic user turn carrying the
//! serialized result text (text fidelity is the contract here, not the
//! provider's structured tool-response shape).

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::llm::message::{ChatMessage, Role, ToolCall, ToolDefinition};
use crate::llm::{ChatProvider, CompletionRequest, NO_RESPONSE, ProviderReply, ToolChoice};

const PROVIDER: &str = "gemini";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const MAX_OUTPUT_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    function_call: Option<FunctionCall>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolGroup {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    function_calling_config: FunctionCallingConfig,
}

#[derive(Serialize)]
struct FunctionCallingConfig {
    mode: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<Content>,
}

// ── Translation ─────────────────────────────────────────────────────

fn text_content(role: &str, text: &str) -> Content {
    Content {
        role: Some(role.to_string()),
        parts: vec![Part {
            text: Some(text.to_string()),
            function_call: None,
        }],
    }
}

/// Fold system messages into one instruction and map the rest into turns.
fn to_wire_contents(messages: &[ChatMessage]) -> (Option<Content>, Vec<Content>) {
    let instruction: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let system_instruction = (!instruction.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part {
            text: Some(instruction.join("\n")),
            function_call: None,
        }],
    });

    let contents = messages
        .iter()
        .filter_map(|m| match (m.role, &m.tool_call) {
            (Role::System, _) => None,
            (Role::User, _) => Some(text_content("user", &m.content)),
            (Role::Assistant, Some(call)) => Some(Content {
                role: Some("model".into()),
                parts: vec![Part {
                    text: None,
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                }],
            }),
            (Role::Assistant, None) => Some(text_content("model", &m.content)),
            // Tool results go back as synthetic user turns with the
            // serialized result text.
            (Role::Tool, _) => Some(text_content("user", &m.content)),
        })
        .collect();

    (system_instruction, contents)
}

fn to_wire_tools(tools: &[ToolDefinition]) -> Vec<ToolGroup> {
    vec![ToolGroup {
        function_declarations: tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect(),
    }]
}

/// Walk the first candidate's parts: the first function call wins; text
/// parts concatenate otherwise.
fn parse_reply(response: WireResponse) -> Result<ProviderReply, ProviderError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: PROVIDER,
            reason: "response contained no candidates".into(),
        })?;

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let mut text = String::new();
    let mut tool_call = None;
    let mut dropped = 0usize;
    for part in parts {
        if let Some(call) = part.function_call {
            if tool_call.is_none() {
                // The wire shape carries no correlation id; synthesize one.
                tool_call = Some(ToolCall::new(
                    uuid::Uuid::new_v4().to_string(),
                    call.name,
                    call.args,
                ));
            } else {
                dropped += 1;
            }
        } else if let Some(t) = part.text {
            text.push_str(&t);
        }
    }
    if dropped > 0 {
        tracing::warn!(
            dropped,
            "Backend returned multiple function calls; honoring only the first"
        );
    }

    if text.is_empty() && tool_call.is_none() {
        text = NO_RESPONSE.to_string();
    }

    Ok(ProviderReply { text, tool_call })
}

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

/// Generative-style provider over the Gemini generateContent API.
pub struct GeminiProvider {
    api_key: SecretString,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, model: &str) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{API_BASE}/{}:generateContent?key={}",
            self.model,
            self.api_key.expose_secret()
        )
    }
}

#[async_trait::async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<ProviderReply, ProviderError> {
        let (system_instruction, contents) = to_wire_contents(&request.messages);
        let has_tools = !request.tools.is_empty();
        let body = WireRequest {
            system_instruction,
            contents,
            tools: has_tools.then(|| to_wire_tools(&request.tools)),
            tool_config: has_tools.then(|| ToolConfig {
                function_calling_config: FunctionCallingConfig {
                    mode: match request.tool_choice {
                        ToolChoice::Auto => "AUTO",
                        ToolChoice::None => "NONE",
                    },
                },
            }),
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
                temperature: TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(self.api_url())
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
