//! stock-scrape service entry point.

use anyhow::Result;
use std::net::SocketAddr;
use stock_common::config::Config;
use stock_common::logging::init_logging_with_exclusions;
use stock_scrape::build_router;
use stock_scrape::service::{build_state, shutdown_signal};
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = Config::load_with_env()?;
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );
    config.validate()?;

    tracing::info!("Stock Scrape v{}", env!("CARGO_PKG_VERSION"));

    let state = build_state(&config.scrape)?;
    tracing::info!(
        search_mode = %state.default_strategy,
        engine_url = %config.scrape.engine_url,
        output_dir = %config.scrape.output_dir,
        "Scrape pipeline ready"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state).layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.bind_address(), config.scrape_port()).parse()?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
