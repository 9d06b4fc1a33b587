//! API request handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::input::parse_payload;
use crate::pipeline::{EnhancementResult, ForecastEnhancer};

// ============================================================================
// Shared State
// ============================================================================

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub enhancer: Arc<ForecastEnhancer>,
    /// Budget for one enhancement before the statistical result is served
    pub request_timeout: Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(enhancer: Arc<ForecastEnhancer>) -> Self {
        let request_timeout = Duration::from_secs(enhancer.config().server.request_timeout_secs);
        Self {
            enhancer,
            request_timeout,
            started_at: Instant::now(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// ============================================================================
// Enhancement
// ============================================================================

/// `POST /api/v1/enhance`
///
/// Parses the payload, runs enhancement on the blocking pool and returns the
/// enhanced forecast with its metrics. If the budget runs out, the statistical
/// strategy result is returned instead of an error.
pub async fn enhance(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rejection) => return ApiErrorResponse::bad_request(rejection.body_text()),
    };

    let forecast = match parse_payload(&payload, &state.enhancer.input_defaults()) {
        Ok(f) => Arc::new(f),
        Err(e) => return ApiErrorResponse::bad_request(e.to_string()),
    };

    let started = Instant::now();
    let enhancer = Arc::clone(&state.enhancer);
    let input = Arc::clone(&forecast);
    let task = tokio::task::spawn_blocking(move || enhancer.enhance(&input));

    let outcome = match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            warn!(error = %join_err, "Enhancement task failed");
            return ApiErrorResponse::internal("enhancement task failed");
        }
        Err(_) => {
            warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "Enhancement timed out, serving statistical result"
            );
            let enhancer = Arc::clone(&state.enhancer);
            match tokio::task::spawn_blocking(move || enhancer.enhance_statistical_only(&forecast)).await {
                Ok(result) => result,
                Err(join_err) => {
                    warn!(error = %join_err, "Statistical fallback task failed");
                    return ApiErrorResponse::internal("enhancement task failed");
                }
            }
        }
    };

    match outcome {
        Ok(enhanced) => {
            let result = EnhancementResult::new(enhanced);
            info!(
                variables = result.metrics.variables_enhanced,
                confidence = result.metrics.overall_confidence,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Enhanced forecast"
            );
            ApiResponse::ok(result)
        }
        Err(e) => ApiErrorResponse::from_enhance_error(&e),
    }
}

// ============================================================================
// Configuration & Health
// ============================================================================

/// `GET /api/v1/config`
///
/// Effective configuration.
pub async fn get_config(State(state): State<AppState>) -> Response {
    ApiResponse::ok(state.enhancer.config())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub uptime_secs: u64,
    pub cache_entries: Option<usize>,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        backend: state.enhancer.backend_name(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        cache_entries: state.enhancer.cache().map(|c| c.len()),
    })
}

/// Fallback for unknown routes
pub async fn not_found() -> Response {
    ApiErrorResponse::not_found("no such endpoint")
}
