//! Configuration for the image proxy

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend_host: String,
    pub backend_port: u16,
    pub backend_timeout: Duration,
    pub cache_capacity: usize,
    pub images_dir: PathBuf,
    /// When set, concurrent misses for the same term share one fetch
    pub single_flight: bool,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3004);

        let backend_host =
            env::var("IMAGE_SERVICE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let backend_port = env::var("IMAGE_SERVICE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(1249);

        let backend_timeout = env::var("IMAGE_SERVICE_TIMEOUT_MS")
            .ok()
            .and_then(|t| t.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(image_service_client::DEFAULT_TIMEOUT);

        let cache_capacity = env::var("MAX_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(term_image_cache::DEFAULT_CAPACITY);

        let images_dir = env::var("IMAGES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./images"));

        let single_flight = env::var("SINGLE_FLIGHT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            port,
            backend_host,
            backend_port,
            backend_timeout,
            cache_capacity,
            images_dir,
            single_flight,
        }
    }
}
