//! Tool trait and execution context.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::llm::{ToolDefinition, ToolResult};

/// Identity context bound to the current request.
///
/// Handlers read and write user state only through the storage collaborator,
/// keyed by this identity. The context is built fresh per inbound message and
/// never shared across requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// A named, schema-described capability the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON-Schema object describing the named parameters. The `required`
    /// list doubles as the registry's validation contract.
    fn parameters_schema(&self) -> Value;

    async fn execute(
        &self,
        args: &Map<String, Value>,
        ctx: &RequestContext,
    ) -> Result<ToolResult, ToolError>;

    /// Declaration advertised to the LLM backend.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Extract a required non-empty string parameter.
pub fn require_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
}
