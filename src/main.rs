//! Git Browser - serve every repository below a directory over HTTP
//!
//! # Usage
//! ```bash
//! git-browser /srv/git                  # Serve on 127.0.0.1:8088
//! git-browser /srv/git --port 9000      # Different port
//! git-browser . --default-branch main   # Repositories using `main`
//! ```

use std::net::SocketAddr;

use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use git_browser::{create_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = ServerConfig::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.root = match std::fs::canonicalize(&config.root) {
        Ok(root) if root.is_dir() => root,
        Ok(root) => {
            eprintln!("✗ Not a directory: {}", root.display());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("✗ Cannot open root directory {}: {}", config.root.display(), e);
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::new(config.bind_addr, config.port);
    tracing::info!(
        root = %config.root.display(),
        default_branch = %config.default_branch,
        history_timeout = ?config.history_timeout(),
        cache = !config.no_cache,
        "starting git-browser"
    );

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(config))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("✗ Failed to bind to {}: {}", addr, e);
            eprintln!("  Try a different port with --port <PORT>");
            std::process::exit(1);
        }
    };

    tracing::info!("listening on http://{}", addr);

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("shutting down");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
