mod config;
mod errors;
mod fetch;
mod llm_client;
mod models;
mod outreach;
mod portfolio;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, EmbeddingBackend};
use crate::fetch::fetcher::{FetchSettings, HttpPageFetcher};
use crate::llm_client::{LlmClient, LlmSettings};
use crate::outreach::pipeline::Pipeline;
use crate::portfolio::catalog::load_catalog;
use crate::portfolio::embedder::{Embedder, HttpEmbedder, OnnxEmbedder, MINILM_MODEL_NAME};
use crate::portfolio::index::PortfolioIndex;
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

    info!("Starting Outreach API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(LlmSettings {
        api_key: config.llm_api_key.clone(),
        base_url: config.llm_base_url.clone(),
        model: config.llm_model.clone(),
        timeout: Duration::from_secs(config.llm_timeout_secs),
        max_attempts: config.llm_max_attempts,
        retry_backoff: Duration::from_millis(config.llm_retry_backoff_ms),
    })
    .context("Failed to build LLM client")?;
    info!("LLM client initialized (model: {})", llm.model());

    // Build the portfolio index once, before any request can query it
    let embedder = build_embedder(&config)?;
    info!("Embedder: {}", embedder.id());

    let mut index = PortfolioIndex::open(&config.vectorstore_path, embedder)
        .context("Failed to open portfolio snapshot")?;
    if index.is_empty() {
        let rows = load_catalog(&config.portfolio_csv)?;
        index
            .build(&rows)
            .await
            .context("Failed to build portfolio index")?;
    }
    info!(
        "Portfolio index ready with {} entries (built {:?})",
        index.len(),
        index.created_at()
    );
    let portfolio = Arc::new(index.entries().cloned().collect::<Vec<_>>());

    // Initialize page fetcher
    let fetcher = HttpPageFetcher::new(FetchSettings {
        timeout: Duration::from_secs(config.fetch_timeout_secs),
        max_chars: config.fetch_max_chars,
        allow_private_hosts: config.fetch_allow_private,
    })
    .context("Failed to build page fetcher")?;

    let pipeline = Pipeline::new(Arc::new(fetcher), Arc::new(llm), Arc::new(index));

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        portfolio,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once a UI host exists

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    Ok(match config.embedding_backend {
        EmbeddingBackend::Onnx => Arc::new(
            OnnxEmbedder::new(
                MINILM_MODEL_NAME,
                &config.onnx_model_path,
                &config.onnx_tokenizer_path,
            )
            .context("Failed to load ONNX embedding model")?,
        ),
        EmbeddingBackend::Http => Arc::new(
            HttpEmbedder::new(
                config.embedding_api_url.clone(),
                config.embedding_model.clone(),
                config.embedding_api_key.clone(),
                Duration::from_secs(config.embedding_timeout_secs),
            )
            .context("Failed to build embedding client")?,
        ),
    })
}
