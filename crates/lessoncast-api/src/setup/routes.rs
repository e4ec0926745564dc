//! Route configuration and setup

use crate::constants::{API_PREFIX, MEDIA_PREFIX, OPENAPI_PATH};
use crate::handlers;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use lessoncast_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let protected_routes = lesson_video_routes().layer(axum::middleware::from_fn_with_state(
        state.jwt.clone(),
        crate::auth::middleware::auth_middleware,
    ));

    let mut app = public_routes().merge(protected_routes);
    if state.local_media.is_some() {
        tracing::info!(prefix = MEDIA_PREFIX, "Serving local media through signed URLs");
        app = app.merge(media_routes());
    }

    let body_limit = usize::try_from(config.max_video_size_bytes).unwrap_or(usize::MAX);

    // Server-level concurrency limit against resource exhaustion
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);

    let app = app
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_PATH).path("/docs"))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Public routes (no authentication required)
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            OPENAPI_PATH,
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}

/// Lesson video routes (require a bearer token)
fn lesson_video_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/lessons/{{lesson_id}}/video/upload-url", API_PREFIX),
            get(handlers::lesson_video::request_upload_url),
        )
        .route(
            &format!("{}/lessons/{{lesson_id}}/video/upload-complete", API_PREFIX),
            axum::routing::post(handlers::lesson_video::complete_upload),
        )
        .route(
            &format!("{}/lessons/{{lesson_id}}/video", API_PREFIX),
            get(handlers::lesson_video::get_video).delete(handlers::lesson_video::delete_video),
        )
        .route(
            &format!("{}/lessons/{{lesson_id}}/video/stream-url", API_PREFIX),
            get(handlers::lesson_video::get_stream_url),
        )
}

/// Signed media URLs carry their own token; no bearer auth here.
fn media_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        &format!("{}/{{*key}}", MEDIA_PREFIX),
        get(handlers::media::get_media).put(handlers::media::put_media),
    )
}
