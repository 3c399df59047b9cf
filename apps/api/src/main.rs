mod analysis;
mod config;
mod errors;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::orchestrator::{AnalysisOrchestrator, SystemStamper};
use crate::config::Config;
use crate::llm_client::key_pool::KeyPool;
use crate::llm_client::{CompletionProvider, LlmClient};
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

    info!(
        "Starting Matchlens API v{} ({:?})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    // Initialize LLM client
    let key_pool = Arc::new(KeyPool::new(
        config.llm_api_keys.clone(),
        config.llm_key_error_threshold,
    ));
    let llm = LlmClient::new(&config.llm_api_url, config.llm_model.clone(), key_pool.clone())?;
    info!(
        "LLM client initialized (model: {}, keys: {})",
        llm.model(),
        key_pool.len()
    );

    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(llm),
        Arc::new(SystemStamper),
        config.environment,
        config.max_input_chars,
    );

    // Build app state
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        key_pool,
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
