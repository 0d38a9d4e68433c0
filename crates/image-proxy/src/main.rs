//! Image Proxy Service
//!
//! Accepts HTTP requests for images identified by a search term, fetches
//! uncached terms from the upstream TCP image service, stores payloads on
//! disk, and serves repeat requests from the cache.

mod config;
mod error;
mod server;
mod service;
mod types;

use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::server::{start_server, ServerState, SharedState};
use crate::service::ImageService;
use image_service_client::ImageServiceClient;
use std::sync::Arc;
use term_image_cache::TermImageCache;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("image_proxy=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Image Proxy Service...");

    let config = Config::from_env();
    info!("Port: {}", config.port);
    info!("Images dir: {:?}", config.images_dir);
    info!("Cache capacity: {} entries", config.cache_capacity);
    info!(
        "Image service: {}:{} (timeout {:?})",
        config.backend_host, config.backend_port, config.backend_timeout
    );

    // Ensure the images directory exists
    tokio::fs::create_dir_all(&config.images_dir)
        .await
        .map_err(|e| ProxyError::Storage(Box::new(e)))?;

    let cache = Arc::new(TermImageCache::new(config.cache_capacity));
    let client = ImageServiceClient::new(
        config.backend_host.clone(),
        config.backend_port,
        config.backend_timeout,
    );
    let service = ImageService::new(cache, client, config.images_dir, config.single_flight);

    let state: SharedState = Arc::new(ServerState::new(service));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(|e| ProxyError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
