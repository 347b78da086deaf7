//! Route configuration and setup

use crate::constants::{HEALTH_PATH, MULTIPART_OVERHEAD_BYTES, READY_PATH};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use movshift_core::Config;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;

    // The body limit only bounds the raw request; the per-file limit is checked
    // while streaming so that oversize uploads get the regular error body.
    let body_limit = usize::try_from(
        config
            .max_upload_size_bytes()
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route(
            "/upload",
            post(handlers::upload::upload_video).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/download/{filename}",
            get(handlers::download::download_video),
        );

    let prefix = config.api_prefix().trim_end_matches('/');
    let app = Router::new()
        .route(HEALTH_PATH, get(handlers::health::liveness_check))
        .route(READY_PATH, get(handlers::health::readiness_check));

    let app = if prefix.is_empty() {
        app.merge(api_routes)
    } else {
        app.nest(prefix, api_routes)
    };

    tracing::info!(
        api_prefix = %prefix,
        body_limit = body_limit,
        "Routes configured"
    );

    Ok(app
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state))
}

/// Setup CORS configuration
pub fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        if config.is_production() {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production"
            ));
        }
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
