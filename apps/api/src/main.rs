mod analysis;
mod config;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod retrieval;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::extraction::PdfExtractor;
use crate::llm_client::embeddings::HttpEmbedder;
use crate::llm_client::{HttpGenerator, ModelTransport};
use crate::retrieval::VectorIndexCache;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Matcher API v{}", env!("CARGO_PKG_VERSION"));

    let settings = config.pipeline.clone();
    info!(
        chunk_size = settings.chunk.size,
        chunk_overlap = settings.chunk.overlap,
        top_k = settings.top_k,
        "Pipeline settings loaded"
    );

    // Model backends share one HTTP client and retry policy
    let transport = ModelTransport::new(config.model_api_key.clone(), settings.model_timeout)
        .context("Failed to build model HTTP client")?;
    let embedder = Arc::new(HttpEmbedder::new(
        transport.clone(),
        config.embedding_url.clone(),
        settings.embed_batch_size,
    ));
    let generator = Arc::new(HttpGenerator::new(
        transport,
        config.generation_url.clone(),
        settings.generation,
    ));
    info!(
        embedding_url = %config.embedding_url,
        generation_url = %config.generation_url,
        "Model clients initialized"
    );

    let extractor = Arc::new(PdfExtractor::new(settings.pdf_workers));
    let cache = Arc::new(VectorIndexCache::new());

    let state = AppState::new(settings, extractor, embedder, generator, cache);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
