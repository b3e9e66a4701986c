//! Environment-driven configuration.

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{Backend, ProviderConfig};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_VERIFY_TOKEN: &str = "whatsapp_webhook_verify_token_2024";

/// Service configuration.
pub struct AppConfig {
    /// Which LLM backend serves both agent variants.
    pub backend: Backend,
    /// HTTP listen port (Cloud Run injects `PORT`).
    pub port: u16,
    /// Path of the local user database.
    pub db_path: String,
    /// Token echoed during the Meta webhook verification handshake.
    pub verify_token: String,
    /// App secret for webhook signature checks; absent skips verification
    /// with a warning, as the original service does.
    pub app_secret: Option<SecretString>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match std::env::var("LLM_BACKEND").as_deref() {
            Ok("gemini") => Backend::Gemini,
            Ok("openai") | Err(_) => Backend::OpenAi,
            Ok(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "LLM_BACKEND".into(),
                    message: format!("unknown backend {other:?} (expected openai or gemini)"),
                });
            }
        };

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "PORT".into(),
                message: "not a valid port number".into(),
            })?;

        Ok(Self {
            backend,
            port,
            db_path: std::env::var("COACH_DB_PATH")
                .unwrap_or_else(|_| "./data/daily-coach.db".to_string()),
            verify_token: std::env::var("WHATSAPP_VERIFY_TOKEN")
                .unwrap_or_else(|_| DEFAULT_VERIFY_TOKEN.to_string()),
            app_secret: std::env::var("WHATSAPP_APP_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(SecretString::from),
        })
    }

    /// Provider configuration for the selected backend.
    ///
    /// `None` when the credential is absent or blank: the agents then run
    /// degraded with the fixed "not configured" reply instead of aborting
    /// startup.
    pub fn provider_config(&self) -> Option<ProviderConfig> {
        let (key_var, model_var, default_model) = match self.backend {
            Backend::OpenAi => ("OPENAI_API_KEY", "OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            Backend::Gemini => ("GEMINI_API_KEY", "GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        };

        let api_key = std::env::var(key_var).ok().filter(|k| !k.trim().is_empty())?;
        let model = std::env::var(model_var).unwrap_or_else(|_| default_model.to_string());

        Some(ProviderConfig {
            backend: self.backend,
            api_key: SecretString::from(api_key),
            model,
        })
    }
}
