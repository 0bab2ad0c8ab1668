// This is the entry point of the Google Docs MCP proxy.
//
// **Architecture Overview:**
// - `core/` = Protocol logic (session registry, tool dispatcher)
// - `infra/` = Implementations of core traits (Google Docs API client)
// - `http/` = Transport adapter (SSE stream, side channel, metadata)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Wire up the router and serve

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with a handful of mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "http/http_layer.rs"]
mod http;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::core::session::SessionRegistry;
use crate::core::tools::{DocumentWriter, ToolService};
use crate::http::routes::{router, AppState, ServiceMetadata};
use crate::infra::google_docs::{GoogleDocsApiClient, OauthCredentials};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Configuration errors are the only fatal ones: fail before binding.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let docs_client = GoogleDocsApiClient::new(
        OauthCredentials {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
        },
        config.upstream_timeout,
    )?;
    let writer: Arc<dyn DocumentWriter> = Arc::new(docs_client);

    // The tool catalog is built exactly once here and shared read-only
    // across every session.
    let tools = Arc::new(ToolService::new(writer));
    let registry = Arc::new(SessionRegistry::new());

    let state = AppState {
        registry,
        tools,
        metadata: ServiceMetadata::default(),
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "google-docs-writer MCP proxy listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        return;
    }
    tracing::info!("shutdown signal received, draining sessions");
}
