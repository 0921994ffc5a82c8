//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error types for validation, session management and processing
///
/// The first group of variants describes problems with the request itself and
/// is reported to clients verbatim. The second group covers processing and
/// environment failures whose details are logged but not exposed.
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Neither an uploaded file nor base64 data was supplied
    #[error("No image provided: {0}")]
    InputMissing(String),

    /// Requested model is not one of the supported variants
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Requested output format is not one of png, jpg, jpeg, webp
    #[error("Invalid output format: {0}")]
    InvalidFormat(String),

    /// Payload exceeds the configured size limit
    #[error("{}", too_large_message(.size, .max))]
    TooLarge {
        /// Actual payload size in bytes, `None` when the body was streamed
        size: Option<usize>,
        /// Configured maximum in bytes
        max: usize,
    },

    /// Bytes could not be parsed as an image
    #[error("Invalid image file: {0}")]
    Undecodable(String),

    /// Image decoded but its container format is not accepted
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Width or height outside the accepted range
    #[error("Image dimensions {width}x{height} out of range ({reason})")]
    DimensionOutOfRange {
        width: u32,
        height: u32,
        reason: String,
    },

    /// `image_data` field was not valid base64
    #[error("Invalid base64 data: {0}")]
    InvalidBase64(String),

    /// Background removal failed inside the inference layer
    #[error("Background removal failed: {0}")]
    RemovalFailed(String),

    /// An inference session could not be constructed for a model
    #[error("Failed to create session for model '{model}': {message}")]
    SessionConstructionFailed { model: String, message: String },

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors outside of validation
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Model download errors
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

fn too_large_message(size: &Option<usize>, max: &usize) -> String {
    match size {
        Some(size) => format!("File size {size} bytes exceeds maximum limit of {max} bytes"),
        None => format!("Payload exceeds maximum limit of {max} bytes"),
    }
}

impl BgRemovalError {
    /// Create a new input-missing error
    pub fn input_missing<S: Into<String>>(msg: S) -> Self {
        Self::InputMissing(msg.into())
    }

    /// Create a new invalid model error
    pub fn invalid_model<S: Into<String>>(msg: S) -> Self {
        Self::InvalidModel(msg.into())
    }

    /// Create a new invalid output format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a new too-large error
    #[must_use]
    pub fn too_large(size: usize, max: usize) -> Self {
        Self::TooLarge {
            size: Some(size),
            max,
        }
    }

    /// Create a too-large error for a request body whose length may be unknown
    #[must_use]
    pub fn body_too_large(size: Option<usize>, max: usize) -> Self {
        Self::TooLarge { size, max }
    }

    /// Create a new undecodable image error
    pub fn undecodable<S: Into<String>>(msg: S) -> Self {
        Self::Undecodable(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new dimension error
    pub fn dimension_out_of_range<S: Into<String>>(width: u32, height: u32, reason: S) -> Self {
        Self::DimensionOutOfRange {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Create a new invalid base64 error
    pub fn invalid_base64<S: Into<String>>(msg: S) -> Self {
        Self::InvalidBase64(msg.into())
    }

    /// Create a new removal failure
    pub fn removal_failed<S: Into<String>>(msg: S) -> Self {
        Self::RemovalFailed(msg.into())
    }

    /// Create a new session construction error
    pub fn session_construction<M: Into<String>, S: Into<String>>(model: M, msg: S) -> Self {
        Self::SessionConstructionFailed {
            model: model.into(),
            message: msg.into(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create network error with operation context
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(operation: S, error: E) -> Self {
        Self::Network(format!("{}: {}", operation.into(), error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Whether the error was caused by the request rather than the service
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InputMissing(_)
                | Self::InvalidModel(_)
                | Self::InvalidFormat(_)
                | Self::TooLarge { .. }
                | Self::Undecodable(_)
                | Self::UnsupportedFormat(_)
                | Self::DimensionOutOfRange { .. }
                | Self::InvalidBase64(_)
        )
    }

    /// Short title used as the `error` field of JSON error bodies
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::InputMissing(_) => "No image provided",
            Self::InvalidModel(_) => "Invalid model",
            Self::InvalidFormat(_) => "Invalid output format",
            Self::TooLarge { .. } => "File too large",
            Self::Undecodable(_) => "Invalid image file",
            Self::UnsupportedFormat(_) => "Unsupported image format",
            Self::DimensionOutOfRange { .. } => "Image dimensions out of range",
            Self::InvalidBase64(_) => "Invalid base64 data",
            Self::RemovalFailed(_) | Self::SessionConstructionFailed { .. } => "Processing failed",
            Self::Io(_)
            | Self::Image(_)
            | Self::Network(_)
            | Self::InvalidConfig(_)
            | Self::Internal(_) => "Internal server error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = BgRemovalError::invalid_model("foo");
        assert!(matches!(err, BgRemovalError::InvalidModel(_)));

        let err = BgRemovalError::too_large(15, 10);
        assert!(matches!(err, BgRemovalError::TooLarge { size: Some(15), max: 10 }));
        assert_eq!(
            err.to_string(),
            "File size 15 bytes exceeds maximum limit of 10 bytes"
        );

        let err = BgRemovalError::body_too_large(None, 10);
        assert!(matches!(err, BgRemovalError::TooLarge { size: None, max: 10 }));
        assert_eq!(err.to_string(), "Payload exceeds maximum limit of 10 bytes");

        let err = BgRemovalError::session_construction("u2netp", "missing file");
        assert!(matches!(err, BgRemovalError::SessionConstructionFailed { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = BgRemovalError::dimension_out_of_range(1, 1, "min 10x10");
        assert_eq!(
            err.to_string(),
            "Image dimensions 1x1 out of range (min 10x10)"
        );

        let err = BgRemovalError::removal_failed("tensor shape mismatch");
        assert_eq!(
            err.to_string(),
            "Background removal failed: tensor shape mismatch"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(BgRemovalError::input_missing("x").is_client_error());
        assert!(BgRemovalError::invalid_format("gif").is_client_error());
        assert!(BgRemovalError::too_large(2, 1).is_client_error());
        assert!(BgRemovalError::undecodable("x").is_client_error());
        assert!(BgRemovalError::unsupported_format("gif").is_client_error());
        assert!(BgRemovalError::invalid_base64("x").is_client_error());

        assert!(!BgRemovalError::removal_failed("x").is_client_error());
        assert!(!BgRemovalError::session_construction("u2net", "x").is_client_error());
        assert!(!BgRemovalError::internal("x").is_client_error());
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = BgRemovalError::file_io_error("read model", Path::new("/models/u2net.onnx"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("read model"));
        assert!(error_string.contains("/models/u2net.onnx"));

        let err = BgRemovalError::config_value_error("max_file_size", 0, "1-104857600");
        let error_string = err.to_string();
        assert!(error_string.contains("max_file_size"));
        assert!(error_string.contains("1-104857600"));
    }
}
