use std::sync::Arc;

use daily_coach::agent::{AgentProfile, SessionRouter};
use daily_coach::channels::{MessageSender, WhatsAppChannel, WhatsAppConfig};
use daily_coach::config::AppConfig;
use daily_coach::llm::create_provider;
use daily_coach::server::{AppState, routes};
use daily_coach::store::{LibSqlStore, UserStore};
use daily_coach::tools::{
    GetUserInfoTool, MarkChallengeCompletedTool, RegisterUserTool, ToolRegistry,
    UpdateInterestsTool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("🤖 Daily Coach v{}", env!("CARGO_PKG_VERSION"));

    // ── LLM provider ─────────────────────────────────────────────────────
    // A missing credential degrades both agents to the fixed "not
    // configured" reply; the server still comes up. Reported once here.
    let provider = match config.provider_config() {
        Some(provider_config) => {
            let provider = create_provider(&provider_config);
            eprintln!("   Backend: {} ({})", provider.name(), provider.model());
            Some(provider)
        }
        None => {
            tracing::warn!("LLM credentials not set; agents will reply with fixed copy");
            eprintln!("   Backend: NOT CONFIGURED");
            None
        }
    };

    // ── User database ────────────────────────────────────────────────────
    let store: Arc<dyn UserStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path);

    // ── Agent variants ───────────────────────────────────────────────────
    let onboarding_tools =
        ToolRegistry::with_tools(vec![Arc::new(RegisterUserTool::new(Arc::clone(&store)))]);
    let dialogue_tools = ToolRegistry::with_tools(vec![
        Arc::new(UpdateInterestsTool::new(Arc::clone(&store))),
        Arc::new(GetUserInfoTool::new(Arc::clone(&store))),
        Arc::new(MarkChallengeCompletedTool::new(Arc::clone(&store))),
    ]);

    let router = Arc::new(SessionRouter::new(
        AgentProfile::onboarding(provider.clone(), onboarding_tools),
        AgentProfile::dialogue(provider, dialogue_tools),
        Arc::clone(&store),
    ));

    // ── Outbound channel ─────────────────────────────────────────────────
    let sender: Option<Arc<dyn MessageSender>> = match WhatsAppConfig::from_env() {
        Some(whatsapp_config) => {
            eprintln!("   WhatsApp: enabled");
            Some(Arc::new(WhatsAppChannel::new(whatsapp_config)))
        }
        None => {
            eprintln!("   WhatsApp: NOT CONFIGURED (replies will be logged only)");
            None
        }
    };

    // ── HTTP server ──────────────────────────────────────────────────────
    let state = AppState {
        router,
        sender,
        verify_token: config.verify_token.clone(),
        app_secret: config.app_secret.clone(),
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Webhook server started");
    eprintln!("   Listening: http://0.0.0.0:{}\n", config.port);

    axum::serve(listener, routes(state)).await?;

    Ok(())
}
