//! Error types for Daily Coach.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM backend errors, categorized at the adapter boundary.
///
/// Raw transport errors never cross this boundary; every failure is mapped
/// into one of these categories so the orchestrator can pick user-facing
/// copy without knowing which backend it talks to.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Authentication failed for provider {provider}")]
    Auth { provider: &'static str },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: &'static str,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} transient failure: {reason}")]
    Transient {
        provider: &'static str,
        reason: String,
    },

    #[error("Invalid response from provider {provider}: {reason}")]
    InvalidResponse {
        provider: &'static str,
        reason: String,
    },

    #[error("Provider {provider} request failed: {reason}")]
    Unknown {
        provider: &'static str,
        reason: String,
    },
}

/// Tool execution errors.
///
/// These stay inside the registry: `ToolRegistry::dispatch` converts every
/// variant into a failed `ToolResult` so the tool-calling loop always reaches
/// its follow-up call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),

    #[error("tool arguments were not a JSON object")]
    MalformedArguments,

    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("{0}")]
    ExecutionFailed(String),
}

/// User storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outbound messaging channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: &'static str, reason: String },

    #[error("Channel {name} is not configured: {reason}")]
    NotConfigured { name: &'static str, reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
