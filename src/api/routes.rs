//! API route definitions
//!
//! - POST /api/v1/enhance - enhance a forecast payload
//! - GET  /api/v1/config  - effective configuration
//! - GET  /health         - liveness and backend name

use axum::{routing::{get, post}, Router};

use super::handlers::{self, AppState};

/// Versioned API routes, nested under `/api/v1`
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/enhance", post(handlers::enhance))
        .route("/config", get(handlers::get_config))
        .with_state(state)
}

/// Root-level health endpoint
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .with_state(state)
}
