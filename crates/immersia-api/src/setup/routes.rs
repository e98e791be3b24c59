//! Route configuration and setup

use crate::api_doc::ApiDoc;
use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Json, Router,
};
use immersia_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// Slack on top of the configured chunk size for multipart framing overhead.
const BODY_LIMIT_SLACK_BYTES: usize = 1024 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let upload_routes = Router::new()
        .route("/upload/chunk/init", post(handlers::init_chunked_upload))
        .route("/upload/chunk/upload", post(handlers::upload_chunk))
        .route(
            "/upload/chunk/{identifier}/progress",
            get(handlers::get_chunked_upload_progress),
        )
        .route(
            "/upload/chunk/complete",
            post(handlers::complete_chunked_upload),
        )
        .route(
            "/upload/chunk/{identifier}",
            delete(handlers::cancel_chunked_upload),
        );

    // Server-level concurrency limit to protect against resource exhaustion under extreme load
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);

    let router = Router::new()
        .route("/health", get(health))
        .route("/api-doc/openapi.json", get(openapi_spec))
        .nest(API_PREFIX, upload_routes)
        .layer(RequestBodyLimitLayer::new(
            config.max_chunk_size_bytes + BODY_LIMIT_SLACK_BYTES,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .with_state(state);

    Ok(router)
}

async fn health() -> &'static str {
    "OK"
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(Any)
    };

    Ok(cors)
}
