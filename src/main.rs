mod badip;
mod cache;
mod cidr;
mod config;
mod decision;
mod enrichment;
mod error;
mod middleware;
mod quota;
mod response;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use badip::BadIpLists;
use config::Config;
use middleware::{AppState, admin_router, with_filter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = load_config()?;
    let startup_client = reqwest::Client::new();
    let bad_ip_lists = BadIpLists::load(&startup_client, &config.bad_ip_lists)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    info!("Starting request filter v{}", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(AppState::new(config, bad_ip_lists));

    let app = build_router(state);

    let addr: SocketAddr = std::env::var("FILTER_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn load_config() -> anyhow::Result<Config> {
    let config_path =
        std::env::var("FILTER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    info!("Loading configuration from {}", config_path);
    Config::load(&config_path).map_err(|e| anyhow::anyhow!("{}", e))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

/// The downstream application is opaque to the filter (spec.md §6); this
/// placeholder handler stands in for whatever the caller mounts behind the
/// middleware.
async fn downstream_placeholder() -> &'static str {
    "ok"
}

fn build_router(state: Arc<AppState>) -> Router {
    let downstream = Router::new().fallback(get(downstream_placeholder));
    let filtered = with_filter(downstream, state.clone()).layer(TraceLayer::new_for_http());

    Router::new().merge(admin_router(state)).merge(filtered)
}

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
