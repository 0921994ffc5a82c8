//! HTTP surface of the service
//!
//! Routes:
//! - `GET /` API information
//! - `GET /health` liveness and loaded models
//! - `GET /models` supported models
//! - `POST /remove-background` background removal
//! - `OPTIONS /remove-background` CORS preflight

pub mod error;
pub mod handlers;
pub mod upload;

pub use error::{ApiError, ErrorBody};
pub use handlers::Base64Response;
pub use upload::{decode_image_data, RemovalForm, RemovalRequest, UploadedFile};

use crate::config::{ServerConfig, ValidationLimits};
use crate::error::{BgRemovalError, Result};
use crate::services::{BackgroundRemovalService, ImageValidator};
use crate::session_registry::ModelSessionRegistry;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Extra room on top of the file limit for base64 inflation and form overhead
const BODY_LIMIT_OVERHEAD: usize = 1024 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub validator: ImageValidator,
    pub removal: Arc<BackgroundRemovalService>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: Arc<ModelSessionRegistry>, config: &ServerConfig) -> Self {
        Self {
            validator: ImageValidator::new(config.limits),
            removal: Arc::new(BackgroundRemovalService::new(
                registry,
                config.inference_timeout,
            )),
        }
    }
}

impl AsRef<ValidationLimits> for AppState {
    fn as_ref(&self) -> &ValidationLimits {
        self.validator.limits()
    }
}

/// Request body limit for a given file size limit
///
/// Base64 payloads are a third larger than the file they carry.
#[must_use]
pub fn body_limit(max_file_size: usize) -> usize {
    max_file_size
        .saturating_add(max_file_size / 3)
        .saturating_add(BODY_LIMIT_OVERHEAD)
}

/// Permissive cross-origin policy
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-requested-with"),
        ])
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let limit = body_limit(state.validator.limits().max_file_size);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/models", get(handlers::models))
        .route(
            "/remove-background",
            axum::routing::post(handlers::remove_background).options(handlers::preflight),
        )
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
///
/// # Errors
/// - Invalid bind address or the port is unavailable
/// - Server I/O failure
pub async fn serve<F>(config: &ServerConfig, state: AppState, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BgRemovalError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!(%addr, "Starting Background Remover API");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit() {
        let ten_mib = 10 * 1024 * 1024;
        let limit = body_limit(ten_mib);
        assert!(limit > ten_mib * 4 / 3);
        assert!(limit < 15 * 1024 * 1024);
        assert_eq!(body_limit(usize::MAX), usize::MAX);
    }
}
