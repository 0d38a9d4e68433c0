//! HTTP server for the image proxy endpoints
//!
//! Provides /health, /image, /image/{filename}, /image-service/health,
//! and /cache/clear.

use crate::error::ProxyError;
use crate::service::ImageService;
use crate::types::{
    BackendInfo, ClearCacheResponse, ErrorResponse, HealthResponse, ImageRequest,
    NotFoundResponse, ServiceHealthResponse,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared state for the HTTP server
pub struct ServerState {
    pub service: ImageService,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(service: ImageService) -> Self {
        Self {
            service,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/image", post(get_image))
        .route("/image/{filename}", get(get_stored_image))
        .route("/image-service/health", get(image_service_health))
        .route("/cache/clear", post(clear_cache))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let stats = state.service.cache().stats().await;
    let uptime = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "Image Proxy Service".to_string(),
        uptime,
        timestamp: Utc::now().to_rfc3339(),
        cache: stats.into(),
        image_service: BackendInfo {
            host: state.service.client().host().to_string(),
            port: state.service.client().port(),
        },
    })
}

/// Fetch (or serve from cache) the image for a search term
async fn get_image(State(state): State<SharedState>, Json(req): Json<ImageRequest>) -> Response {
    let search_term = req.search_term.unwrap_or_default();

    match state.service.get_image(&search_term).await {
        Ok(image) => {
            let cached = if image.cache_hit { "true" } else { "false" };

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "image/jpeg")
                .header(header::CACHE_CONTROL, "public, max-age=3600")
                .header("X-Cached", cached)
                .body(Body::from(image.bytes))
                .unwrap()
        }
        Err(e) => {
            warn!(term = %search_term, error = %e, "Failed to serve image");
            error_response(e, &search_term)
        }
    }
}

/// Serve a previously stored image file by name
async fn get_stored_image(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Response {
    match state.service.read_stored(&filename).await {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/jpeg")
            .header(header::CACHE_CONTROL, "public, max-age=86400")
            .body(Body::from(bytes))
            .unwrap(),
        Err(e) => {
            warn!(filename = %filename, error = %e, "Failed to serve stored image");
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Image not found")),
            )
                .into_response()
        }
    }
}

/// Reachability probe for the upstream image service
async fn image_service_health(State(state): State<SharedState>) -> Json<ServiceHealthResponse> {
    let healthy = state.service.client().probe().await;

    Json(ServiceHealthResponse {
        success: true,
        image_service_healthy: healthy,
        host: state.service.client().host().to_string(),
        port: state.service.client().port(),
    })
}

/// Clear the cache and delete stored files
async fn clear_cache(State(state): State<SharedState>) -> Json<ClearCacheResponse> {
    let previous = state.service.clear_cache().await;

    Json(ClearCacheResponse {
        success: true,
        message: "Cache cleared successfully".to_string(),
        previous_cache_size: previous,
    })
}

/// 404 fallback listing the routable endpoints
async fn not_found() -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Endpoint not found".to_string(),
            available_endpoints: vec![
                "GET /health".to_string(),
                "POST /image".to_string(),
                "GET /image/{filename}".to_string(),
                "GET /image-service/health".to_string(),
                "POST /cache/clear".to_string(),
            ],
        }),
    )
}

fn error_response(err: ProxyError, search_term: &str) -> Response {
    match err {
        ProxyError::InvalidInput => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing or invalid search term")),
        )
            .into_response(),
        ProxyError::ServiceUnavailable(fetch_err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Image service unavailable".to_string(),
                details: Some(fetch_err.to_string()),
                search_term: Some(search_term.to_string()),
            }),
        )
            .into_response(),
        ProxyError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Image not found")),
        )
            .into_response(),
        ProxyError::Storage(_) | ProxyError::Config(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "Internal server error while processing image request",
            )),
        )
            .into_response(),
    }
}
