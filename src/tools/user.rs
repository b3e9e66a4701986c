//! User-facing tools backed by the storage collaborator.
//!
//! `register_user` belongs to the onboarding agent; the other three belong
//! to the dialogue agent. Handlers never touch orchestration state: they
//! read and write only through `UserStore`, keyed by the request identity.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::llm::ToolResult;
use crate::store::UserStore;
use crate::tools::tool::{RequestContext, Tool, require_str};

/// Registers a new user with name and interests.
pub struct RegisterUserTool {
    store: Arc<dyn UserStore>,
}

impl RegisterUserTool {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RegisterUserTool {
    fn name(&self) -> &str {
        "register_user"
    }

    fn description(&self) -> &str {
        "Registra un nuevo usuario en el sistema con su nombre y párrafo de intereses. \
         Solo debes llamar esta función cuando tengas tanto el nombre como los intereses \
         del usuario claramente identificados."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "El nombre completo o cómo quiere ser llamado el usuario"
                },
                "interests": {
                    "type": "string",
                    "description": "Un párrafo descriptivo sobre los intereses, hobbies, \
                                    pasiones o temas que le interesan al usuario."
                }
            },
            "required": ["name", "interests"]
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        ctx: &RequestContext,
    ) -> Result<ToolResult, ToolError> {
        let name = require_str(args, "name")?;
        let interests = require_str(args, "interests")?;

        match self.store.create_user(&ctx.user_id, name, interests).await {
            Ok(true) => Ok(ToolResult::ok_message(format!(
                "Usuario {name} registrado exitosamente"
            ))),
            Ok(false) => Ok(ToolResult::fail(
                "No se pudo registrar el usuario en la base de datos",
            )),
            Err(e) => Err(ToolError::ExecutionFailed(e.to_string())),
        }
    }
}

/// Replaces the user's interests paragraph.
pub struct UpdateInterestsTool {
    store: Arc<dyn UserStore>,
}

impl UpdateInterestsTool {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateInterestsTool {
    fn name(&self) -> &str {
        "update_interests"
    }

    fn description(&self) -> &str {
        "Actualiza los intereses del usuario cuando menciona nuevos intereses, cambios en \
         sus gustos, o cuando descubres información relevante sobre lo que le interesa."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "interests": {
                    "type": "string",
                    "description": "El nuevo párrafo completo que describe los intereses \
                                    actualizados del usuario"
                }
            },
            "required": ["interests"]
        })
    }

    async fn execute(
        &self,
        args: &Map<String, Value>,
        ctx: &RequestContext,
    ) -> Result<ToolResult, ToolError> {
        let interests = require_str(args, "interests")?;

        match self
            .store
            .update_user_interests(&ctx.user_id, interests)
            .await
        {
            Ok(true) => Ok(ToolResult::ok_message("Intereses actualizados correctamente")),
            Ok(false) => Ok(ToolResult::fail("No se pudieron actualizar los intereses")),
            Err(e) => Err(ToolError::ExecutionFailed(e.to_string())),
        }
    }
}

/// Reads the user's profile for personalization.
pub struct GetUserInfoTool {
    store: Arc<dyn UserStore>,
}

impl GetUserInfoTool {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetUserInfoTool {
    fn name(&self) -> &str {
        "get_user_info"
    }

    fn description(&self) -> &str {
        "Obtiene la información del usuario (nombre, intereses, retos completados) para \
         personalizar mejor los retos y conversaciones."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(
        &self,
        _args: &Map<String, Value>,
        ctx: &RequestContext,
    ) -> Result<ToolResult, ToolError> {
        match self.store.get_user(&ctx.user_id).await {
            Ok(Some(user)) => Ok(ToolResult::ok_payload(serde_json::json!({
                "user": {
                    "name": user.name,
                    "interests": user.interests,
                    "challenges_completed": user.challenges_completed,
                    "last_challenge_date": user.last_challenge_date.map(|d| d.to_rfc3339()),
                }
            }))),
            Ok(None) => Ok(ToolResult::fail("Usuario no encontrado")),
            Err(e) => Err(ToolError::ExecutionFailed(e.to_string())),
        }
    }
}

/// Marks the current challenge as completed.
pub struct MarkChallengeCompletedTool {
    store: Arc<dyn UserStore>,
}

impl MarkChallengeCompletedTool {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MarkChallengeCompletedTool {
    fn name(&self) -> &str {
        "mark_challenge_completed"
    }

    fn description(&self) -> &str {
        "Marca un reto como completado cuando el usuario indica que lo ha terminado o logrado."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(
        &self,
        _args: &Map<String, Value>,
        ctx: &RequestContext,
    ) -> Result<ToolResult, ToolError> {
        match self.store.increment_challenges_completed(&ctx.user_id).await {
            Ok(true) => Ok(ToolResult::ok_message("Reto marcado como completado")),
            Ok(false) => Ok(ToolResult::fail(
                "No se pudo marcar el reto como completado",
            )),
            Err(e) => Err(ToolError::ExecutionFailed(e.to_string())),
        }
    }
}
