//! REST API module using Axum
//!
//! Wraps a shared [`ForecastEnhancer`](crate::pipeline::ForecastEnhancer)
//! behind a small JSON API. Every response uses the envelope in
//! [`envelope`].

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::AppState;

use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Create the complete application router.
pub fn create_app(state: AppState) -> Router {
    let max_body = state.enhancer.config().server.max_body_bytes;

    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(routes::health_routes(state))
        .fallback(handlers::not_found)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(CompressionLayer::new())
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}
