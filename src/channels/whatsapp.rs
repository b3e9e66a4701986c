//! WhatsApp channel — sends messages through the Meta Cloud API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::MessageSender;
use crate::error::ChannelError;

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v21.0";

/// Configuration for the Meta WhatsApp Business API.
#[derive(Clone)]
pub struct WhatsAppConfig {
    /// Access token (`WHATSAPP_API_KEY`).
    pub access_token: SecretString,
    /// Business phone number id the messages are sent from.
    pub phone_number_id: String,
}

impl WhatsAppConfig {
    /// Build from environment. Returns `None` when the channel is not
    /// configured, which disables outbound delivery but keeps the service up.
    pub fn from_env() -> Option<Self> {
        let access_token = std::env::var("WHATSAPP_API_KEY").ok()?;
        let phone_number_id = std::env::var("WHATSAPP_PHONE_NUMBER_ID").ok()?;
        Some(Self {
            access_token: SecretString::from(access_token),
            phone_number_id,
        })
    }
}

#[derive(Deserialize)]
struct GraphErrorBody {
    error: Option<GraphError>,
}

#[derive(Deserialize)]
struct GraphError {
    message: Option<String>,
    code: Option<i64>,
}

/// WhatsApp channel over the Meta Graph API.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!("{GRAPH_API_BASE}/{}/messages", self.config.phone_number_id)
    }
}

#[async_trait]
impl MessageSender for WhatsAppChannel {
    async fn send_message(&self, to: &str, text: &str) -> Result<(), ChannelError> {
        // The Graph API wants the number without the leading '+'.
        let to_number = to.trim().trim_start_matches('+');

        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to_number,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": text,
            }
        });

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "whatsapp",
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(to = %to_number, "Message sent via WhatsApp");
            return Ok(());
        }

        // Decode the Graph error body for a useful log line.
        let body: GraphErrorBody = response.json().await.unwrap_or(GraphErrorBody { error: None });
        let (code, message) = body
            .error
            .map(|e| {
                (
                    e.code.unwrap_or(status.as_u16() as i64),
                    e.message.unwrap_or_else(|| "Error desconocido".into()),
                )
            })
            .unwrap_or((status.as_u16() as i64, "Error desconocido".into()));

        Err(ChannelError::SendFailed {
            name: "whatsapp",
            reason: format!("{code}: {message}"),
        })
    }
}
