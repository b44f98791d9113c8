// Library exports for testing and external use

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::{sync::Arc, time::Duration};

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use handlers::{health, upload};
use services::{
    file_storage::FileStorageService,
    lifecycle::{Lifecycle, Readiness},
};
use utils::config::AppConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<FileStorageService>,
    pub lifecycle: Arc<Lifecycle>,
    pub readiness: Arc<Readiness>,
}

/// Build the application router with its middleware stack
pub fn build_router(app_state: AppState) -> Router {
    let config = app_state.config.clone();

    Router::new()
        // Health check endpoint
        .route("/health", get(health::health_check))
        .route("/api/health", get(health::health_check))

        // File upload endpoints
        .route("/api/upload", post(upload::upload_file))
        .route("/api/uploads", post(upload::upload_files))

        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::request_event::request_event_middleware,
        ))
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_seconds)))
                .layer(cors_layer(&config)),
        )
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}
