//! Tool registry — resolves and executes model-requested tool calls.

use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::{ToolCall, ToolDefinition, ToolResult};
use crate::tools::tool::{RequestContext, Tool};

/// Registry of the tools available to one agent variant.
///
/// Tool sets are fixed at startup, so the map needs no interior mutability.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Build a registry from a fixed tool set.
    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        tracing::debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
    }

    /// Declarations advertised to the LLM backend.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Execute a requested call. Never errors: unknown names, malformed
    /// arguments, missing required parameters, and handler failures all
    /// normalize into a failed `ToolResult` so the caller can proceed to the
    /// follow-up call and let the model narrate the failure.
    pub async fn dispatch(&self, call: &ToolCall, ctx: &RequestContext) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Model requested unknown tool");
            return ToolResult::fail(format!("unknown tool: {}", call.name));
        };

        let Some(args) = call.arguments.as_object() else {
            tracing::warn!(tool = %call.name, "Tool arguments were not a JSON object");
            return ToolResult::fail("tool arguments were not a JSON object");
        };

        // Validate the descriptor's required list up front so handlers see
        // complete argument sets.
        let schema = tool.parameters_schema();
        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for key in required.iter().filter_map(|k| k.as_str()) {
                if !args.contains_key(key) || args[key].is_null() {
                    return ToolResult::fail(format!("missing required parameter: {key}"));
                }
            }
        }

        match tool.execute(args, ctx).await {
            Ok(result) => {
                tracing::debug!(tool = %call.name, success = result.success, "Tool executed");
                result
            }
            Err(e) => {
                tracing::error!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::fail(e.to_string())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
