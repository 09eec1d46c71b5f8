//! stock-scraper-api entry point.

use anyhow::Result;
use std::net::SocketAddr;
use stock_common::config::Config;
use stock_common::logging::init_logging;
use stock_scrape::service::shutdown_signal;
use stock_scraper_api::{build_router, LegacyState};
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_with_env()?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );
    config.validate()?;

    tracing::info!("Stock Scraper API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        scrape_service = %config.scrape.sibling_scrape_url,
        output_dir = %config.scrape.output_dir,
        "Using synchronous scrape service"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(LegacyState::from_config(&config.scrape)).layer(cors);
    let addr: SocketAddr = format!("{}:{}", config.bind_address(), config.legacy_port()).parse()?;

    tracing::info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
