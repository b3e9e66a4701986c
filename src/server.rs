//! HTTP ingress — Meta WhatsApp webhook plus status endpoints.
//!
//! The webhook always answers 200 once the signature checks out, so Meta
//! does not redeliver on downstream hiccups; each inbound text message is
//! handled in its own task.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::agent::{SessionRouter, replies};
use crate::channels::MessageSender;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<SessionRouter>,
    /// Outbound transport; `None` disables delivery (replies are logged).
    pub sender: Option<Arc<dyn MessageSender>>,
    pub verify_token: String,
    pub app_secret: Option<SecretString>,
}

/// Build the Axum router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/health", get(health))
        .route("/webhook/whatsapp", get(verify_webhook).post(receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn status() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "online",
        "service": "daily-coach",
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ── Verification handshake ──────────────────────────────────────────

#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Meta calls this once to prove webhook ownership: echo the challenge when
/// the token matches.
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let token_ok = params.mode.as_deref() == Some("subscribe")
        && params.verify_token.as_deref() == Some(state.verify_token.as_str());

    if token_ok {
        tracing::info!("Webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        tracing::warn!(mode = ?params.mode, "Webhook verification failed");
        (StatusCode::FORBIDDEN, String::new())
    }
}

// ── Inbound messages ────────────────────────────────────────────────

#[derive(Deserialize)]
struct WebhookPayload {
    object: Option<String>,
    #[serde(default)]
    entry: Vec<WebhookEntry>,
}

#[derive(Deserialize)]
struct WebhookEntry {
    #[serde(default)]
    changes: Vec<WebhookChange>,
}

#[derive(Deserialize)]
struct WebhookChange {
    #[serde(default)]
    value: WebhookValue,
}

#[derive(Deserialize, Default)]
struct WebhookValue {
    #[serde(default)]
    messages: Vec<InboundMessage>,
}

#[derive(Deserialize)]
struct InboundMessage {
    from: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<InboundText>,
}

#[derive(Deserialize)]
struct InboundText {
    body: String,
}

/// Constant-time HMAC-SHA256 check of Meta's `x-hub-signature-256` header.
fn signature_valid(secret: &SecretString, payload: &[u8], header: &str) -> bool {
    let signature = header.strip_prefix("sha256=").unwrap_or(header);
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret.expose_secret().as_bytes());
    ring::hmac::verify(&key, payload, &signature).is_ok()
}

async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(secret) = &state.app_secret {
        let header = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok());
        match header {
            Some(header) if signature_valid(secret, &body, header) => {}
            _ => {
                tracing::warn!("Invalid webhook signature");
                return (
                    StatusCode::FORBIDDEN,
                    Json(serde_json::json!({"error": "invalid signature"})),
                );
            }
        }
    } else {
        tracing::warn!("WHATSAPP_APP_SECRET not set, skipping signature verification");
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Unparsable webhook payload");
            // Still 200 so Meta does not retry a permanently bad payload.
            return (StatusCode::OK, Json(serde_json::json!({"status": "error"})));
        }
    };

    if payload.object.as_deref() == Some("whatsapp_business_account") {
        for entry in payload.entry {
            for change in entry.changes {
                for message in change.value.messages {
                    dispatch_message(&state, message);
                }
            }
        }
    }

    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// Handle one inbound message in its own task so the webhook returns
/// immediately.
fn dispatch_message(state: &AppState, message: InboundMessage) {
    let Some(from) = message.from else {
        return;
    };

    let router = Arc::clone(&state.router);
    let sender = state.sender.clone();
    let kind = message.kind.unwrap_or_default();

    tokio::spawn(async move {
        let reply = match kind.as_str() {
            "text" => {
                let text = message.text.map(|t| t.body).unwrap_or_default();
                tracing::info!(from = %from, chars = text.len(), "Message received");
                router.handle_message(&from, &text).await
            }
            "image" | "audio" | "video" | "document" => {
                tracing::info!(from = %from, kind = %kind, "Non-text message, not processed");
                replies::TEXT_ONLY.to_string()
            }
            other => {
                tracing::debug!(from = %from, kind = %other, "Ignoring message type");
                return;
            }
        };

        match &sender {
            Some(sender) => {
                if let Err(e) = sender.send_message(&from, &reply).await {
                    tracing::error!(to = %from, error = %e, "Failed to deliver reply");
                }
            }
            None => tracing::warn!(to = %from, "No outbound channel configured, reply dropped"),
        }
    });
}
