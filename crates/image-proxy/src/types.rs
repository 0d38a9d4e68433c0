//! HTTP request and response payloads
//!
//! Field names follow the JSON wire format expected by the frontend
//! (camelCase), hence the serde renames.

use serde::{Deserialize, Serialize};
use term_image_cache::CacheStats;

/// Body of `POST /image`
#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    #[serde(rename = "searchTerm")]
    pub search_term: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub uptime: u64,
    pub timestamp: String,
    pub cache: CacheInfo,
    #[serde(rename = "imageService")]
    pub image_service: BackendInfo,
}

#[derive(Debug, Serialize)]
pub struct CacheInfo {
    pub size: usize,
    #[serde(rename = "maxSize")]
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl From<CacheStats> for CacheInfo {
    fn from(stats: CacheStats) -> Self {
        Self {
            size: stats.entries,
            max_size: stats.capacity,
            hits: stats.hits,
            misses: stats.misses,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BackendInfo {
    pub host: String,
    pub port: u16,
}

/// Response of `GET /image-service/health`
#[derive(Debug, Serialize)]
pub struct ServiceHealthResponse {
    pub success: bool,
    #[serde(rename = "imageServiceHealthy")]
    pub image_service_healthy: bool,
    pub host: String,
    pub port: u16,
}

/// Response of `POST /cache/clear`
#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "previousCacheSize")]
    pub previous_cache_size: usize,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "searchTerm", skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            search_term: None,
        }
    }
}

/// 404 fallback body listing the routable endpoints
#[derive(Debug, Serialize)]
pub struct NotFoundResponse {
    pub error: String,
    #[serde(rename = "availableEndpoints")]
    pub available_endpoints: Vec<String>,
}
