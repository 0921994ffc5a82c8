//! Route handlers

use crate::api::error::ApiError;
use crate::api::upload::{RemovalForm, RemovalRequest};
use crate::api::AppState;
use crate::models::ModelName;
use crate::services::{run_blocking, EncodedPayload, RemovalOutcome, ResponseEncoder};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// File extensions advertised on `GET /`
const SUPPORTED_EXTENSIONS: [&str; 6] = [".png", ".jpg", ".jpeg", ".webp", ".bmp", ".tiff"];

/// JSON body of a base64 removal response
#[derive(Debug, Clone, Serialize)]
pub struct Base64Response {
    pub success: bool,
    pub image_data: String,
    pub format: String,
    pub model_used: ModelName,
    pub original_size: [u32; 2],
    pub output_size: [u32; 2],
    pub fallback_used: bool,
}

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Background Remover API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/": "API information",
            "/remove-background": "POST - Remove background from image",
            "/models": "GET - List available models",
            "/health": "GET - Health check",
        },
        "supported_formats": SUPPORTED_EXTENSIONS,
        "max_file_size_mb": state.validator.limits().max_file_size_mb(),
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let registry = state.removal.registry();
    Json(json!({
        "status": "healthy",
        "message": "Background Remover API is running",
        "backend": registry.backend_name(),
        "loaded_models": registry.loaded_models(),
        "sessions": registry.stats(),
    }))
}

/// `GET /models`
pub async fn models() -> Json<Value> {
    let descriptions: BTreeMap<&str, &str> = ModelName::ALL
        .into_iter()
        .map(|m| (m.as_str(), m.description()))
        .collect();
    Json(json!({
        "models": ModelName::ALL,
        "default": ModelName::DEFAULT,
        "descriptions": descriptions,
    }))
}

/// `OPTIONS /remove-background`
pub async fn preflight() -> Json<Value> {
    Json(json!({}))
}

/// `POST /remove-background`
#[tracing::instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn remove_background(
    State(state): State<AppState>,
    form: RemovalForm,
) -> Result<Response, ApiError> {
    let RemovalRequest {
        payload,
        model,
        format,
        format_token,
        want_base64,
    } = form.resolve()?;
    tracing::debug!(
        model = %model,
        format = %format_token,
        base64 = want_base64,
        bytes = payload.len(),
        "Removal requested"
    );

    let validator = state.validator;
    let validated = run_blocking("validation", move || validator.validate(&payload)).await?;
    tracing::info!(
        width = validated.image.width(),
        height = validated.image.height(),
        color = ?validated.image.color(),
        "Processing image"
    );

    let RemovalOutcome {
        image,
        model_used,
        fallback,
        original_size,
        output_size,
    } = state.removal.remove_background(validated.image, model).await?;
    let encoded = run_blocking("encoding", move || {
        ResponseEncoder::encode(&image, format, want_base64)
    })
    .await?;

    match encoded.payload {
        EncodedPayload::DataUrl(image_data) => Ok(Json(Base64Response {
            success: true,
            image_data,
            format: format_token,
            model_used,
            original_size: [original_size.0, original_size.1],
            output_size: [output_size.0, output_size.1],
            fallback_used: fallback,
        })
        .into_response()),
        EncodedPayload::Binary(bytes) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, encoded.mime_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!(
                        "attachment; filename=\"background_removed.{}\"",
                        format_token
                    ),
                ),
            ],
            bytes,
        )
            .into_response()),
    }
}

/// Fallback for unmatched routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
