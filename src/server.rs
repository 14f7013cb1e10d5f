//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that load every
//! artifact once and wire the recommender and mood classifier into the MCP
//! tool handler.

use crate::config::AppConfig;
use crate::embedding;
use crate::mood::MoodClassifier;
use crate::recommend::Recommender;
use crate::tools::MediaTools;
use anyhow::{Context, Result};
use rmcp::ServiceExt;
use std::sync::Arc;

/// Shared setup: embedding provider, catalogs, reference table, mood model.
/// Any missing artifact is fatal.
fn setup_shared_state(config: &AppConfig) -> Result<(Arc<Recommender>, Arc<MoodClassifier>)> {
    let provider = embedding::create_provider(&config.embedding)?;
    let embedding: Arc<dyn embedding::EmbeddingProvider> = Arc::from(provider);
    tracing::info!("embedding provider ready");

    let recommender =
        Recommender::load(config, embedding).context("failed to load recommender artifacts")?;
    tracing::info!(rows = recommender.table().len(), "recommender ready");

    let classifier = MoodClassifier::load(&config.resolved_classifier_path())
        .context("failed to load mood model")?;

    Ok((Arc::new(recommender), Arc::new(classifier)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: AppConfig) -> Result<()> {
    tracing::info!("starting mediarec MCP server on stdio");

    let (recommender, classifier) = setup_shared_state(&config)?;

    let tools = MediaTools::new(recommender, classifier);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: AppConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting mediarec MCP server on HTTP");

    let (recommender, classifier) = setup_shared_state(&config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(MediaTools::new(recommender.clone(), classifier.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
