//! Session router — picks the agent variant and owns per-user history.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::agent::history::{ConversationHistory, PRIMARY_WINDOW};
use crate::agent::orchestrator::{self, TurnOutcome};
use crate::agent::profile::{AgentProfile, replies};
use crate::llm::ChatMessage;
use crate::store::{UserState, UserStore};
use crate::tools::RequestContext;

/// Routes each inbound message to the onboarding or dialogue agent based on
/// the persisted `onboarding_completed` flag, and maintains the bounded
/// per-identity conversation history.
pub struct SessionRouter {
    onboarding: AgentProfile,
    dialogue: AgentProfile,
    store: Arc<dyn UserStore>,
    histories: Mutex<HashMap<String, ConversationHistory>>,
}

impl SessionRouter {
    pub fn new(onboarding: AgentProfile, dialogue: AgentProfile, store: Arc<dyn UserStore>) -> Self {
        Self {
            onboarding,
            dialogue,
            store,
            histories: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one inbound text message and produce the outbound reply.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return replies::EMPTY_MESSAGE.to_string();
        }

        // A lookup failure routes like an unknown user; the onboarding agent
        // is the safe default for a store that cannot answer.
        let user = match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(user = %user_id, error = %e, "User lookup failed");
                None
            }
        };

        let registered = user
            .as_ref()
            .map(|u| u.onboarding_completed)
            .unwrap_or(false);
        let (profile, overlay) = if registered {
            let overlay = user.as_ref().map(user_context);
            (&self.dialogue, overlay)
        } else {
            (&self.onboarding, None)
        };
        tracing::debug!(user = %user_id, agent = profile.name, "Routing message");

        let history = {
            let histories = self.histories.lock().await;
            histories
                .get(user_id)
                .map(|h| h.recent(PRIMARY_WINDOW))
                .unwrap_or_default()
        };

        let ctx = RequestContext::new(user_id);
        let outcome =
            orchestrator::run_turn(profile, &ctx, overlay.as_deref(), &history, text).await;

        let final_text = finish_text(&outcome);
        self.commit(user_id, text, &outcome, &final_text).await;
        final_text
    }

    /// Commit the turn to the long-lived history: user + assistant on
    /// success, only the user's own message on a degraded outcome.
    /// Intermediate tool messages never land here.
    async fn commit(&self, user_id: &str, text: &str, outcome: &TurnOutcome, final_text: &str) {
        let mut histories = self.histories.lock().await;
        let history = histories.entry(user_id.to_string()).or_default();
        history.push(ChatMessage::user(text));
        if !outcome.degraded {
            history.push(ChatMessage::assistant(final_text));
        }
    }

    /// Number of stored history entries for an identity (observability).
    pub async fn history_len(&self, user_id: &str) -> usize {
        self.histories
            .lock()
            .await
            .get(user_id)
            .map(|h| h.len())
            .unwrap_or(0)
    }
}

/// Append the one-time transition notice when registration completed within
/// this request. Only the onboarding registry carries `register_user`, so a
/// successful invocation of it is the completion signal. The notice is
/// response text only; it never becomes part of the agent's identity.
fn finish_text(outcome: &TurnOutcome) -> String {
    let registered_now = !outcome.degraded
        && outcome
            .tool_invocation
            .as_ref()
            .is_some_and(|t| t.name == "register_user" && t.success);

    if registered_now {
        format!("{}{}", outcome.text, replies::ONBOARDING_DONE)
    } else {
        outcome.text.clone()
    }
}

/// Read-only user snapshot injected into the dialogue system prompt.
///
/// Computed fresh per request and threaded through as a value, so concurrent
/// requests for different users can never observe each other's context.
fn user_context(user: &UserState) -> String {
    let mut context = format!(
        "Información del usuario:\n- Nombre: {}\n- Intereses: {}\n- Retos completados: {}",
        user.name, user.interests, user.challenges_completed
    );

    if let Some(challenge) = user.latest_challenge() {
        context.push_str(&format!("\n- Último reto asignado: {}", challenge.prompt));
        if !challenge.options.is_empty() {
            context.push_str(&format!("\n  Opciones: {}", challenge.options.join(", ")));
        }
        if let Some(answer) = &challenge.answer {
            context.push_str(&format!("\n  Respuesta del usuario: {answer}"));
        }
        if let Some(correct) = challenge.correct {
            context.push_str(&format!(
                "\n  Respuesta correcta: {}",
                if correct { "sí" } else { "no" }
            ));
        }
        context.push_str(&format!(
            "\n  Completado: {}",
            if challenge.completed { "sí" } else { "no" }
        ));
    }

    context
}
