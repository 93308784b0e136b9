//! HTTP server for the media cache proxy
//!
//! Provides /health, /image and the lifecycle endpoints.

use crate::decoder::{DecodedImage, ImageDecoder};
use crate::types::{ErrorResponse, HealthResponse, ImageQuery};
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tiered_cache::{CacheError, CacheManager};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use url::Url;

const X_IMAGE_WIDTH: HeaderName = HeaderName::from_static("x-image-width");
const X_IMAGE_HEIGHT: HeaderName = HeaderName::from_static("x-image-height");

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: CacheManager<ImageDecoder>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: CacheManager<ImageDecoder>) -> Self {
        Self {
            cache,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/image", get(get_image))
        .route("/lifecycle/background", post(background))
        .route("/lifecycle/memory-pressure", post(memory_pressure))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn start_server<F>(state: SharedState, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache_stats = state.cache.stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: cache_stats,
    })
}

/// Get an image by URL, through both cache tiers
async fn get_image(State(state): State<SharedState>, Query(query): Query<ImageQuery>) -> Response {
    if let Err(reason) = validate_url(&query.url) {
        return error_response(StatusCode::BAD_REQUEST, reason);
    }

    match state.cache.fetch(&query.url, query.ignore_cache).await {
        Ok(image) => image_response(&image),
        Err(e) => {
            warn!(url = %query.url, error = %e, "Failed to serve image");
            error_response(status_for(&e), e.to_string())
        }
    }
}

/// The host is going to the background
async fn background(State(state): State<SharedState>) -> Response {
    match state.cache.on_background().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

/// The host is short on memory
async fn memory_pressure(State(state): State<SharedState>) -> StatusCode {
    state.cache.on_memory_pressure();
    StatusCode::NO_CONTENT
}

fn validate_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("Invalid url: {}", e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("Unsupported scheme: {}", other)),
    }
}

fn status_for(err: &CacheError) -> StatusCode {
    match err {
        CacheError::FetchFailed(_) | CacheError::PayloadUnreadable(_) => StatusCode::BAD_GATEWAY,
        CacheError::DecodeFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CacheError::Closed => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn image_response(image: &DecodedImage) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.mime_type().to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
            (X_IMAGE_WIDTH, image.width.to_string()),
            (X_IMAGE_HEIGHT, image.height.to_string()),
        ],
        image.bytes.clone(),
    )
        .into_response()
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}
