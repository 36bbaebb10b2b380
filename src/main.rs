//! Attachment Viewer Server
//!
//! Serves the viewer control surface: the host extension posts page
//! markup, the viewer UI posts intents and fetches rendered pages.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attachment_viewer::cache::HttpFetcher;
use attachment_viewer::config::Config;
use attachment_viewer::render::DocumentEngine;
use attachment_viewer::routes;
use attachment_viewer::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "attachment_viewer=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Attachment Viewer v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Cache holds {} payloads, protecting a radius of {}",
        config.cache.max_entries,
        config.cache.protect_radius
    );

    let fetcher = HttpFetcher::new(config.fetch.timeout_secs).context("Failed to build HTTP client")?;

    let engine = document_engine();
    if engine.is_none() {
        tracing::warn!("Built without a document engine; documents are offered as downloads only");
    }

    // Create application state
    let app_state = AppState::new(config.clone(), Arc::new(fetcher), engine);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server with graceful shutdown
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Attachment Viewer listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

#[cfg(feature = "mupdf")]
fn document_engine() -> Option<Arc<dyn DocumentEngine>> {
    Some(Arc::new(attachment_viewer::render::MupdfEngine))
}

#[cfg(not(feature = "mupdf"))]
fn document_engine() -> Option<Arc<dyn DocumentEngine>> {
    None
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
