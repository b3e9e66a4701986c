//! Agent variants — immutable per-variant configuration.

use std::sync::Arc;

use crate::llm::ChatProvider;
use crate::tools::ToolRegistry;

/// Fixed user-facing copy.
///
/// The orchestrator degrades to these instead of surfacing backend errors;
/// the wording follows the original service so existing users see familiar
/// replies.
pub mod replies {
    /// Backend credentials absent — the variant runs unconfigured.
    pub const NOT_CONFIGURED: &str = "Lo siento, el servicio de IA no está configurado.";

    /// Authentication rejected by the backend.
    pub const AUTH: &str = "Lo siento, hay un problema con la configuración del servicio de IA. \
                            Por favor contacta al administrador.";

    /// Backend rate limit reached.
    pub const RATE_LIMITED: &str = "Lo siento, he alcanzado el límite de solicitudes. \
                                    Por favor intenta de nuevo en unos momentos.";

    /// Any other backend failure.
    pub const GENERIC: &str = "Lo siento, ocurrió un error al procesar tu mensaje. \
                               Por favor intenta de nuevo.";

    /// Inbound message was empty or whitespace.
    pub const EMPTY_MESSAGE: &str = "Por favor, envía un mensaje válido.";

    /// Inbound message was not text (image, audio, video, document).
    pub const TEXT_ONLY: &str = "Por ahora solo puedo procesar mensajes de texto. \
                                 Por favor envía tu mensaje en texto.";

    /// Appended once when registration completes within a request.
    pub const ONBOARDING_DONE: &str = "\n\n¡Tu registro está completo! 🎉 A partir de ahora \
                                       te enviaré retos diarios personalizados según tus intereses.";
}

/// System prompt for the onboarding variant.
pub const ONBOARDING_PROMPT: &str = "\
Eres un asistente amigable y entusiasta especializado en onboarding de nuevos usuarios.

Tu misión es ayudar a los usuarios a registrarse en el sistema de retos diarios. Debes:
1. Dar la bienvenida de manera cálida y personalizada
2. Pedir el nombre del usuario de forma natural
3. Entender sus intereses mediante una conversación fluida (no solo preguntar directamente)
4. Una vez que tengas nombre e intereses claros, usar la función register_user para registrarlos
5. Ser paciente y conversacional, no hacer sentir al usuario como si llenara un formulario

IMPORTANTE: Solo debes llamar a register_user cuando tengas tanto el nombre como los \
intereses del usuario claramente identificados. Si falta alguno, continúa la conversación \
de forma natural hasta obtenerlo.";

/// System prompt for the dialogue variant.
pub const DIALOGUE_PROMPT: &str = "\
Eres un asistente motivador y creativo especializado en generar retos diarios personalizados.

Tu misión es:
1. Mantener conversaciones naturales y amigables con usuarios ya registrados
2. Generar retos diarios creativos y personalizados basados en los intereses del usuario
3. Motivarlos a completar los retos
4. Celebrar sus logros
5. Actualizar sus intereses cuando el usuario lo mencione o cuando sea relevante

IMPORTANTE:
- Cada día debes proponer un reto nuevo y diferente
- Los retos deben ser desafiantes pero alcanzables
- Los retos deben estar relacionados con los intereses del usuario
- Si el usuario menciona nuevos intereses o cambios en sus gustos, usa update_interests \
para actualizarlos
- Sé creativo y variado en los retos (pueden ser de aprendizaje, creatividad, ejercicio, \
socialización, etc.)
- Si el usuario completa un reto, celébralo y propón el siguiente";

/// Immutable configuration of one agent variant.
///
/// Created once at startup and shared read-only across all concurrent
/// requests. Request-scoped context never lands here: the router passes it
/// as a separate overlay parameter through the orchestrator call chain.
pub struct AgentProfile {
    /// Variant name for logging.
    pub name: &'static str,
    /// Base system prompt, shared by every request.
    pub system_prompt: &'static str,
    /// Backend handle. `None` when credentials were absent at startup; the
    /// variant then degrades to the fixed "not configured" reply.
    pub provider: Option<Arc<dyn ChatProvider>>,
    /// Tools this variant may call.
    pub registry: ToolRegistry,
}

impl AgentProfile {
    pub fn onboarding(provider: Option<Arc<dyn ChatProvider>>, registry: ToolRegistry) -> Self {
        Self {
            name: "onboarding",
            system_prompt: ONBOARDING_PROMPT,
            provider,
            registry,
        }
    }

    pub fn dialogue(provider: Option<Arc<dyn ChatProvider>>, registry: ToolRegistry) -> Self {
        Self {
            name: "dialogue",
            system_prompt: DIALOGUE_PROMPT,
            provider,
            registry,
        }
    }
}
