//! Two-phase tool-calling loop.
//!
//! `PrimaryCall → (ToolRequested → ToolExecuting → FollowupCall) → Done`,
//! or straight to `Done` when no tool is requested. Tool failures are data
//! by the time they reach the follow-up call; only provider failures may
//! short-circuit the loop, and those degrade to fixed copy instead of
//! propagating.

use crate::agent::profile::{AgentProfile, replies};
use crate::error::ProviderError;
use crate::llm::{ChatMessage, CompletionRequest, ToolChoice};
use crate::tools::RequestContext;

/// The tool call executed during a turn, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub name: String,
    pub success: bool,
}

/// What a turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Final text for the user.
    pub text: String,
    /// True when the text is fallback copy for a provider failure (or an
    /// unconfigured variant) rather than a model answer. The router commits
    /// only the user's own message for degraded turns.
    pub degraded: bool,
    pub tool_invocation: Option<ToolInvocation>,
}

impl TurnOutcome {
    fn answer(text: String, tool_invocation: Option<ToolInvocation>) -> Self {
        Self {
            text,
            degraded: false,
            tool_invocation,
        }
    }

    fn degraded(text: &str, tool_invocation: Option<ToolInvocation>) -> Self {
        Self {
            text: text.to_string(),
            degraded: true,
            tool_invocation,
        }
    }
}

/// User-facing copy for a provider failure; Auth and RateLimited get
/// distinct wording.
fn copy_for(error: &ProviderError) -> &'static str {
    match error {
        ProviderError::Auth { .. } => replies::AUTH,
        ProviderError::RateLimited { .. } => replies::RATE_LIMITED,
        _ => replies::GENERIC,
    }
}

/// Run one turn of an agent against its backend.
///
/// `overlay` is the request-scoped system-prompt augmentation (user context
/// for the dialogue variant). It is threaded through as a value — the shared
/// profile is never mutated.
pub async fn run_turn(
    profile: &AgentProfile,
    ctx: &RequestContext,
    overlay: Option<&str>,
    history: &[ChatMessage],
    user_message: &str,
) -> TurnOutcome {
    let Some(provider) = profile.provider.as_ref() else {
        tracing::warn!(agent = profile.name, "Agent has no configured provider");
        return TurnOutcome::degraded(replies::NOT_CONFIGURED, None);
    };

    // PrimaryCall: [system(+overlay), recent history, new user message].
    let system_prompt = match overlay {
        Some(extra) => format!("{}\n\n{extra}", profile.system_prompt),
        None => profile.system_prompt.to_string(),
    };
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(user_message));

    let tools = profile.registry.definitions();
    let primary = CompletionRequest::new(messages.clone(), tools.clone());

    let reply = match provider.complete(primary).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(agent = profile.name, error = %e, "Primary call failed");
            return TurnOutcome::degraded(copy_for(&e), None);
        }
    };

    let Some(call) = reply.tool_call else {
        // No tool requested: Done.
        return TurnOutcome::answer(reply.text, None);
    };

    // ToolExecuting: run the single honored call and extend the local
    // buffer. These two messages never reach the persisted history.
    tracing::info!(agent = profile.name, tool = %call.name, user = %ctx.user_id, "Executing tool");
    let result = profile.registry.dispatch(&call, ctx).await;
    let invocation = ToolInvocation {
        name: call.name.clone(),
        success: result.success,
    };

    messages.push(ChatMessage::assistant_tool_call(reply.text, call.clone()));
    messages.push(ChatMessage::tool_result(call, result.to_text()));

    // FollowupCall: same tool set for schema validity, but the model must
    // produce a final answer now.
    let followup = CompletionRequest::new(messages, tools).with_tool_choice(ToolChoice::None);
    match provider.complete(followup).await {
        Ok(reply) => TurnOutcome::answer(reply.text, Some(invocation)),
        Err(e) => {
            // A predictable apology beats a partial, confusing success, so
            // the tool's own result is not surfaced here.
            tracing::error!(agent = profile.name, error = %e, "Follow-up call failed");
            TurnOutcome::degraded(copy_for(&e), Some(invocation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, ToolError};
    use crate::llm::{
        ChatProvider, ProviderReply, Role, ToolCall, ToolResult, tool_results_paired,
    };
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::{Arc, Mutex};

    /// Scripted provider: pops replies in order, records every request.
    struct ScriptedProvider {
        replies: Mutex<Vec<Result<ProviderReply, ProviderError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<ProviderReply, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }
        fn model(&self) -> &str {
            "test-model"
        }
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<ProviderReply, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Ok(ProviderReply {
                    text: "fin".into(),
                    tool_call: None,
                });
            }
            replies.remove(0)
        }
    }

    struct NoteTool {
        fail: bool,
    }

    #[async_trait]
    impl Tool for NoteTool {
        fn name(&self) -> &str {
            "note"
        }
        fn description(&self) -> &str {
            "Takes a note"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _args: &Map<String, Value>,
            _ctx: &RequestContext,
        ) -> Result<ToolResult, ToolError> {
            if self.fail {
                Err(ToolError::ExecutionFailed("disk full".into()))
            } else {
                Ok(ToolResult::ok_message("noted"))
            }
        }
    }

    fn text_reply(text: &str) -> Result<ProviderReply, ProviderError> {
        Ok(ProviderReply {
            text: text.into(),
            tool_call: None,
        })
    }

    fn tool_reply(name: &str) -> Result<ProviderReply, ProviderError> {
        Ok(ProviderReply {
            text: String::new(),
            tool_call: Some(ToolCall::new("call_1", name, serde_json::json!({}))),
        })
    }

    fn profile(provider: Arc<ScriptedProvider>, fail_tool: bool) -> AgentProfile {
        AgentProfile {
            name: "test",
            system_prompt: "Eres un asistente.",
            provider: Some(provider),
            registry: ToolRegistry::with_tools(vec![Arc::new(NoteTool { fail: fail_tool })]),
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new("+52")
    }

    #[tokio::test]
    async fn test_no_tool_call_is_single_phase() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("hola!")]));
        let outcome = run_turn(&profile(provider.clone(), false), &ctx(), None, &[], "hola").await;

        assert_eq!(outcome.text, "hola!");
        assert!(!outcome.degraded);
        assert!(outcome.tool_invocation.is_none());
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_drives_followup_without_tool_choice() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply("note"),
            text_reply("listo"),
        ]));
        let outcome = run_turn(&profile(provider.clone(), false), &ctx(), None, &[], "anota").await;

        assert_eq!(outcome.text, "listo");
        assert_eq!(
            outcome.tool_invocation,
            Some(ToolInvocation {
                name: "note".into(),
                success: true
            })
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
        // Follow-up keeps the declarations but forbids calling them.
        assert_eq!(requests[1].tool_choice, ToolChoice::None);
        assert!(!requests[1].tools.is_empty());
        // The follow-up buffer holds a well-paired assistant/tool message pair.
        assert!(tool_results_paired(&requests[1].messages));
        assert_eq!(requests[1].messages.last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn test_tool_failure_still_reaches_followup() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply("note"),
            text_reply("no pude anotar eso"),
        ]));
        let outcome = run_turn(&profile(provider.clone(), true), &ctx(), None, &[], "anota").await;

        assert!(!outcome.degraded);
        assert_eq!(outcome.text, "no pude anotar eso");
        assert_eq!(
            outcome.tool_invocation,
            Some(ToolInvocation {
                name: "note".into(),
                success: false
            })
        );
        // The failure traveled to the model as data.
        let followup = &provider.requests()[1];
        let tool_msg = followup.messages.last().unwrap();
        assert!(tool_msg.content.contains("disk full"));
    }

    #[tokio::test]
    async fn test_unknown_tool_still_reaches_followup() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply("missing_tool"),
            text_reply("esa función no existe"),
        ]));
        let outcome = run_turn(&profile(provider.clone(), false), &ctx(), None, &[], "hola").await;

        assert!(!outcome.degraded);
        assert_eq!(provider.requests().len(), 2);
        assert_eq!(
            outcome.tool_invocation,
            Some(ToolInvocation {
                name: "missing_tool".into(),
                success: false
            })
        );
    }

    #[tokio::test]
    async fn test_primary_auth_error_degrades_without_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Auth {
            provider: "scripted",
        })]));
        let outcome = run_turn(&profile(provider.clone(), false), &ctx(), None, &[], "hola").await;

        assert!(outcome.degraded);
        assert_eq!(outcome.text, replies::AUTH);
        assert!(outcome.tool_invocation.is_none());
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_gets_distinct_copy() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::RateLimited {
            provider: "scripted",
            retry_after: None,
        })]));
        let outcome = run_turn(&profile(provider, false), &ctx(), None, &[], "hola").await;

        assert!(outcome.degraded);
        assert_eq!(outcome.text, replies::RATE_LIMITED);
    }

    #[tokio::test]
    async fn test_followup_failure_hides_tool_result() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_reply("note"),
            Err(ProviderError::Transient {
                provider: "scripted",
                reason: "502".into(),
            }),
        ]));
        let outcome = run_turn(&profile(provider, false), &ctx(), None, &[], "anota").await;

        assert!(outcome.degraded);
        assert_eq!(outcome.text, replies::GENERIC);
        // The tool did run; the caller can still observe that.
        assert_eq!(outcome.tool_invocation.as_ref().unwrap().name, "note");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_degrades() {
        let profile = AgentProfile {
            name: "test",
            system_prompt: "x",
            provider: None,
            registry: ToolRegistry::new(),
        };
        let outcome = run_turn(&profile, &ctx(), None, &[], "hola").await;
        assert!(outcome.degraded);
        assert_eq!(outcome.text, replies::NOT_CONFIGURED);
    }

    #[tokio::test]
    async fn test_overlay_lands_in_system_message_only() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("ok")]));
        run_turn(
            &profile(provider.clone(), false),
            &ctx(),
            Some("Nombre: Ana"),
            &[],
            "hola",
        )
        .await;

        let request = &provider.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("Eres un asistente."));
        assert!(request.messages[0].content.contains("Nombre: Ana"));
        // Only the system turn carries the overlay.
        assert!(
            !request.messages[1..]
                .iter()
                .any(|m| m.content.contains("Nombre: Ana"))
        );
    }

    #[tokio::test]
    async fn test_history_slice_precedes_user_message() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_reply("ok")]));
        let history = vec![
            ChatMessage::user("hola"),
            ChatMessage::assistant("buenas"),
        ];
        run_turn(&profile(provider.clone(), false), &ctx(), None, &history, "sigo").await;

        let messages = &provider.requests()[0].messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "hola");
        assert_eq!(messages[3].content, "sigo");
    }
}
