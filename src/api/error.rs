//! HTTP error mapping
//!
//! Every failure leaves the service as a JSON body `{error, message}`.
//! Request problems are answered with 400 (413 for oversize payloads) and
//! their message; anything else is answered with 500 and a generic message
//! while the cause goes to the log.

use crate::error::BgRemovalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Message returned in place of internal failure details
const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred while processing the image";

/// JSON error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Errors produced by the HTTP layer
#[derive(Debug)]
pub enum ApiError {
    /// A pipeline error, classified by [`BgRemovalError::is_client_error`]
    Pipeline(BgRemovalError),
    /// The `image` part was present but had an empty file name
    NoFileSelected,
    /// The request body could not be parsed as a form
    MalformedRequest(String),
    /// No route matched
    NotFound(String),
}

impl From<BgRemovalError> for ApiError {
    fn from(err: BgRemovalError) -> Self {
        Self::Pipeline(err)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Pipeline(BgRemovalError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Pipeline(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoFileSelected | Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let (error, message) = match self {
            Self::Pipeline(BgRemovalError::TooLarge { max, .. }) => (
                "File too large".to_string(),
                format!("Maximum file size is {:.1}MB", *max as f64 / 1024.0 / 1024.0),
            ),
            Self::Pipeline(BgRemovalError::InputMissing(_)) => (
                "No image provided".to_string(),
                "Please provide an image file via 'image' parameter or base64 data via 'image_data'"
                    .to_string(),
            ),
            Self::Pipeline(err) if err.is_client_error() => {
                (err.title().to_string(), err.to_string())
            },
            Self::Pipeline(err) => (err.title().to_string(), GENERIC_FAILURE_MESSAGE.to_string()),
            Self::NoFileSelected => (
                "No file selected".to_string(),
                "The 'image' part has an empty file name".to_string(),
            ),
            Self::MalformedRequest(detail) => ("Bad request".to_string(), detail.clone()),
            Self::NotFound(path) => (
                "Not found".to_string(),
                format!("No route for {path}"),
            ),
        };
        ErrorBody { error, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Pipeline(err) if status.is_server_error() => {
                tracing::error!(error = %err, "Request failed");
            },
            Self::NotFound(_) => {},
            _ => {
                tracing::warn!(status = status.as_u16(), error = ?self, "Request rejected");
            },
        }
        (status, Json(self.body())).into_response()
    }
}
