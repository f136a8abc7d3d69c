mod bot;
mod component;
mod config;
mod error;
mod generator;
mod llm;
mod moderation;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::component::ComponentRegistry;
use crate::config::Config;
use crate::generator::LlmRewriter;
use crate::llm::LlmClient;
use crate::platform::onebot::OneBotClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize logging; [logging].level is the default directive, RUST_LOG wins
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},groupwarden=debug", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Configuration loaded from: {}", config_path.display());
    info!("  Config version: {}", config.plugin.config_version);
    info!("  Model: {}", config.llm.model);
    info!("  Admin API: {}", config.api.base_url);
    info!("  Allowed users: {:?}", config.permissions.allowed_users);
    info!("  Allowed groups: {:?}", config.permissions.allowed_groups);

    let onebot = Arc::new(OneBotClient::new(&config.api)?);
    let llm = Arc::new(LlmClient::new(config.llm.clone()));
    let rewriter = Arc::new(LlmRewriter::new(llm.clone()));

    let mut registry = ComponentRegistry::new();
    moderation::register_components(&config, onebot.clone(), rewriter, &mut registry);
    if registry.is_empty() {
        warn!("No components enabled; the bot will only log events");
    }

    let listen_addr = config.api.listen_addr.clone();
    let state = Arc::new(AppState {
        config,
        registry,
        llm,
        onebot,
    });

    info!("Bot is starting...");
    platform::onebot::run(state, &listen_addr).await
}
