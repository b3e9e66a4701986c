//! Canonical conversation schema shared by all provider adapters.
//!
//! The orchestrator and router only ever see these types; each adapter
//! translates them into its backend's wire shape and back.

use serde::{Deserialize, Serialize};

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Result of a tool execution, fed back to the model.
    Tool,
}

/// A tool invocation requested by the model.
///
/// `id` is an opaque correlation token pairing the call with its result.
/// `arguments` is expected to be a JSON object; anything else is treated as a
/// malformed payload by the registry, never as a transport error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One turn of a conversation.
///
/// Ordering is significant: a `Tool` message must immediately follow the
/// `Assistant` message that issued the matching `ToolCall`. Both carry the
/// call so the pairing survives serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_call: Option<ToolCall>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call: None,
        }
    }

    /// The assistant turn that carried a tool call. `content` may be empty.
    pub fn assistant_tool_call(content: impl Into<String>, call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call: Some(call),
        }
    }

    /// A tool-result turn answering `call`. `content` is the serialized
    /// `ToolResult`.
    pub fn tool_result(call: ToolCall, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call: Some(call),
        }
    }
}

/// Declaration of a callable tool, advertised to the backend.
///
/// `parameters` is the `{type:"object", properties, required}` schema shape.
/// Adapters must carry `required` through without loss; dropping it silently
/// changes model behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Outcome of a tool execution, embedded back into the conversation as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "serde_json::Value::is_null", default)]
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ToolResult {
    /// Successful result with a human-readable message.
    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            payload: serde_json::json!({ "message": message.into() }),
            error: None,
        }
    }

    /// Successful result with a structured payload.
    pub fn ok_payload(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    /// Failed result. The orchestrator still proceeds to the follow-up call
    /// so the model can narrate the failure.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    /// Serialize for embedding into the conversation.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            // ToolResult contains only JSON-native data; this arm is
            // unreachable in practice.
            r#"{"success":false,"error":"unserializable tool result"}"#.to_string()
        })
    }
}

/// Check the tool-result pairing invariant over an ordered message list:
/// every `Tool` message immediately follows an `Assistant` message whose
/// call id matches.
pub fn tool_results_paired(messages: &[ChatMessage]) -> bool {
    messages.iter().enumerate().all(|(i, m)| {
        if m.role != Role::Tool {
            return true;
        }
        let Some(result_call) = &m.tool_call else {
            return false;
        };
        i > 0
            && messages[i - 1].role == Role::Assistant
            && messages[i - 1]
                .tool_call
                .as_ref()
                .is_some_and(|c| c.id == result_call.id)
    })
}
