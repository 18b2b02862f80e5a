mod billing;
mod config;
mod engine;
mod errors;
mod history;
mod layout;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::billing::UnmeteredLedger;
use crate::config::Config;
use crate::engine::oracle::LlmSuggestionOracle;
use crate::engine::BlankPolicy;
use crate::history::LoggingHistoryStore;
use crate::layout::{PackerConfig, TextMetrics};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cloze API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client + suggestion oracle
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let oracle = Arc::new(LlmSuggestionOracle::new(llm));

    // External collaborators — local stand-ins; production deployments wire
    // the real billing and history services behind the same traits.
    let ledger = Arc::new(UnmeteredLedger);
    let history = Arc::new(LoggingHistoryStore);

    // Bounded pool of concurrent generation pipelines
    let generation_limiter = Arc::new(Semaphore::new(config.max_concurrent_generations));
    info!(
        "Generation pool: {} concurrent request(s)",
        config.max_concurrent_generations
    );

    // Build app state
    let state = AppState {
        oracle,
        ledger,
        history,
        config: config.clone(),
        policy: BlankPolicy::default(),
        metrics: TextMetrics::default(),
        packer: PackerConfig::default(),
        generation_limiter,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
