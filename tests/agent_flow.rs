//! End-to-end routing and tool-calling flows against a scripted backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use daily_coach::agent::{AgentProfile, SessionRouter, replies};
use daily_coach::error::ProviderError;
use daily_coach::llm::{
    ChatProvider, CompletionRequest, ProviderReply, Role, ToolCall,
};
use daily_coach::store::{InMemoryStore, UserState, UserStore};
use daily_coach::tools::{
    GetUserInfoTool, MarkChallengeCompletedTool, RegisterUserTool, ToolRegistry,
    UpdateInterestsTool,
};

/// Backend double: pops scripted replies in order and records every request.
struct ScriptedProvider {
    replies: Mutex<Vec<Result<ProviderReply, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn script(&self, reply: Result<ProviderReply, ProviderError>) {
        self.replies.lock().unwrap().push(reply);
    }

    fn script_text(&self, text: &str) {
        self.script(Ok(ProviderReply {
            text: text.into(),
            tool_call: None,
        }));
    }

    fn script_tool_call(&self, name: &str, arguments: serde_json::Value) {
        self.script(Ok(ProviderReply {
            text: String::new(),
            tool_call: Some(ToolCall::new("call_1", name, arguments)),
        }));
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

    async fn complete(&self, request: CompletionRequest) -> Result<ProviderReply, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut replies = self.replies.lock().unwrap();
        assert!(!replies.is_empty(), "backend called more times than scripted");
        replies.remove(0)
    }
}

fn build_router(
    provider: Arc<ScriptedProvider>,
    store: Arc<InMemoryStore>,
) -> SessionRouter {
    let llm: Arc<dyn ChatProvider> = provider;
    let onboarding_tools = ToolRegistry::with_tools(vec![Arc::new(RegisterUserTool::new(
        store.clone() as Arc<dyn UserStore>,
    ))]);
    let dialogue_tools = ToolRegistry::with_tools(vec![
        Arc::new(UpdateInterestsTool::new(store.clone() as Arc<dyn UserStore>)),
        Arc::new(GetUserInfoTool::new(store.clone() as Arc<dyn UserStore>)),
        Arc::new(MarkChallengeCompletedTool::new(
            store.clone() as Arc<dyn UserStore>
        )),
    ]);

    SessionRouter::new(
        AgentProfile::onboarding(Some(llm.clone()), onboarding_tools),
        AgentProfile::dialogue(Some(llm), dialogue_tools),
        store,
    )
}

const PHONE: &str = "+5215550001";

// ── Scenario A: unregistered greeting ───────────────────────────────

#[tokio::test]
async fn unregistered_user_routes_to_onboarding_without_mutation() {
    let provider = ScriptedProvider::new();
    let store = Arc::new(InMemoryStore::new());
    let router = build_router(provider.clone(), store.clone());

    provider.script_text("¡Hola! ¿Cómo te llamas?");
    let reply = router.handle_message(PHONE, "Hola").await;

    assert_eq!(reply, "¡Hola! ¿Cómo te llamas?");
    // No tool call happened, so nothing was persisted.
    assert!(store.get_user(PHONE).await.unwrap().is_none());

    // The onboarding agent advertises exactly register_user.
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    let tool_names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tool_names, ["register_user"]);
}

// ── Scenario B: registration flips onboarding and adds the notice ───

#[tokio::test]
async fn registration_completes_with_transition_notice() {
    let provider = ScriptedProvider::new();
    let store = Arc::new(InMemoryStore::new());
    let router = build_router(provider.clone(), store.clone());

    provider.script_tool_call(
        "register_user",
        serde_json::json!({"name": "Ana", "interests": "ajedrez y cocina"}),
    );
    provider.script_text("¡Bienvenida, Ana!");

    let reply = router
        .handle_message(PHONE, "Me llamo Ana y me gusta el ajedrez")
        .await;

    assert!(reply.starts_with("¡Bienvenida, Ana!"));
    assert!(reply.contains("registro está completo"));

    let user = store.get_user(PHONE).await.unwrap().unwrap();
    assert!(user.onboarding_completed);
    assert_eq!(user.name, "Ana");
}

// ── P5: onboarding never re-selected once registered ────────────────

#[tokio::test]
async fn registered_user_routes_to_dialogue_agent() {
    let provider = ScriptedProvider::new();
    let store = Arc::new(InMemoryStore::new());
    store.insert(UserState::new(PHONE, "Ana", "ajedrez")).await;
    let router = build_router(provider.clone(), store.clone());

    provider.script_text("¿Lista para el reto de hoy?");
    router.handle_message(PHONE, "hola").await;

    let requests = provider.requests();
    let mut tool_names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    tool_names.sort();
    assert_eq!(
        tool_names,
        ["get_user_info", "mark_challenge_completed", "update_interests"]
    );

    // A second registration attempt through the store keeps the flag true.
    store.create_user(PHONE, "Otra", "x").await.unwrap();
    let user = store.get_user(PHONE).await.unwrap().unwrap();
    assert!(user.onboarding_completed);
    assert_eq!(user.name, "Ana");
}

// ── Scenario C: challenge completion through the dialogue agent ─────

#[tokio::test]
async fn challenge_completion_increments_counter() {
    let provider = ScriptedProvider::new();
    let store = Arc::new(InMemoryStore::new());
    let mut user = UserState::new(PHONE, "Ana", "ajedrez");
    user.challenges_completed = 3;
    store.insert(user).await;
    let router = build_router(provider.clone(), store.clone());

    provider.script_tool_call("mark_challenge_completed", serde_json::json!({}));
    provider.script_text("¡Felicidades! Van 4 retos.");

    let reply = router.handle_message(PHONE, "ya lo hice").await;
    assert_eq!(reply, "¡Felicidades! Van 4 retos.");

    let user = store.get_user(PHONE).await.unwrap().unwrap();
    assert_eq!(user.challenges_completed, 4);

    // The primary call's system prompt carried the pre-update snapshot.
    let system = provider.requests()[0].messages[0].clone();
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("Retos completados: 3"));
    assert!(system.content.contains("Nombre: Ana"));
}

// ── Scenario D: auth failure on the primary call ────────────────────

#[tokio::test]
async fn provider_auth_failure_returns_fixed_copy_and_keeps_user_message_only() {
    let provider = ScriptedProvider::new();
    let store = Arc::new(InMemoryStore::new());
    let router = build_router(provider.clone(), store.clone());

    provider.script(Err(ProviderError::Auth {
        provider: "scripted",
    }));

    let reply = router.handle_message(PHONE, "Hola").await;
    assert_eq!(reply, replies::AUTH);
    // No tool executed, no registration happened.
    assert!(store.get_user(PHONE).await.unwrap().is_none());
    // Only the user's own message was committed.
    assert_eq!(router.history_len(PHONE).await, 1);
}

// ── P3: history stays bounded over many turns ───────────────────────

#[tokio::test]
async fn history_is_capped_fifo() {
    let provider = ScriptedProvider::new();
    let store = Arc::new(InMemoryStore::new());
    store.insert(UserState::new(PHONE, "Ana", "ajedrez")).await;
    let router = build_router(provider.clone(), store);

    for i in 0..15 {
        provider.script_text(&format!("respuesta {i}"));
        router.handle_message(PHONE, &format!("mensaje {i}")).await;
    }

    // 15 turns × 2 entries, capped at 20 stored.
    assert_eq!(router.history_len(PHONE).await, 20);

    // The primary call sends at most the last 10 entries plus system+user.
    let last = provider.requests().last().unwrap().messages.clone();
    assert!(last.len() <= 12);
    // Oldest entries were evicted first: turn 0 is gone from the window.
    assert!(!last.iter().any(|m| m.content == "mensaje 0"));
}

// ── P4: tool failure still produces a final answer ──────────────────

#[tokio::test]
async fn tool_failure_still_gets_followup_answer() {
    let provider = ScriptedProvider::new();
    let store = Arc::new(InMemoryStore::new());
    store.insert(UserState::new(PHONE, "Ana", "ajedrez")).await;
    let router = build_router(provider.clone(), store.clone());

    // update_interests without its required parameter fails validation.
    provider.script_tool_call("update_interests", serde_json::json!({}));
    provider.script_text("No pude actualizar tus intereses, ¿me los repites?");

    let reply = router.handle_message(PHONE, "cambié de gustos").await;
    assert_eq!(reply, "No pude actualizar tus intereses, ¿me los repites?");

    // Two calls were made and the failure traveled to the model as data.
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let tool_message = requests[1].messages.last().unwrap();
    assert_eq!(tool_message.role, Role::Tool);
    assert!(tool_message.content.contains("missing required parameter"));
    // Interests were untouched.
    let user = store.get_user(PHONE).await.unwrap().unwrap();
    assert_eq!(user.interests, "ajedrez");
}

// ── Input validation ────────────────────────────────────────────────

#[tokio::test]
async fn empty_message_short_circuits_without_backend_call() {
    let provider = ScriptedProvider::new();
    let store = Arc::new(InMemoryStore::new());
    let router = build_router(provider.clone(), store);

    let reply = router.handle_message(PHONE, "   ").await;
    assert_eq!(reply, replies::EMPTY_MESSAGE);
    assert!(provider.requests().is_empty());
    assert_eq!(router.history_len(PHONE).await, 0);
}

// ── Unconfigured backend degrades per variant ───────────────────────

#[tokio::test]
async fn unconfigured_provider_yields_fixed_reply() {
    let store = Arc::new(InMemoryStore::new());
    let router = SessionRouter::new(
        AgentProfile::onboarding(None, ToolRegistry::new()),
        AgentProfile::dialogue(None, ToolRegistry::new()),
        store,
    );

    let reply = router.handle_message(PHONE, "Hola").await;
    assert_eq!(reply, replies::NOT_CONFIGURED);
    assert_eq!(router.history_len(PHONE).await, 1);
}
