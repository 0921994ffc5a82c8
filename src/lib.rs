#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Background Remover API
//!
//! HTTP service that removes image backgrounds with the U2-Net family of
//! segmentation models running on ONNX Runtime.
//!
//! ## Features
//!
//! - **Models**: `u2net`, `u2netp`, `u2net_human_seg`, `u2net_cloth_seg`,
//!   `isnet-general-use`, loaded lazily and shared across requests
//! - **Inputs**: multipart file upload or base64 (`data:` URLs accepted)
//! - **Outputs**: PNG and WebP with transparency, JPEG flattened onto white,
//!   either as a binary attachment or a base64 data URL in JSON
//! - **Hardware Acceleration**: CUDA, `CoreML` and CPU execution providers
//! - **Model Management**: missing model files are downloaded on first use
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use bgremove_api::{
//!     backends::MockSessionFactory, router, AppState, ModelSessionRegistry, ServerConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::builder().port(8080).build()?;
//! let registry = ModelSessionRegistry::new(
//!     Arc::new(MockSessionFactory::new()),
//!     config.fallback_policy,
//! )
//! .await?;
//! let app = router(AppState::new(Arc::new(registry), &config));
//! # let _ = app;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend
//! - `cli` (default): server binary (argument parsing, subscriber setup)
//! - `tracing-json`: JSON log output for the binary

pub mod api;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod services;
pub mod session_registry;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod utils;

// Public API exports
pub use api::{router, serve, ApiError, AppState};
pub use config::{
    ExecutionProvider, FallbackPolicy, OutputFormat, ServerConfig, ServerConfigBuilder,
    ValidationLimits,
};
pub use download::ModelDownloader;
pub use error::{BgRemovalError, Result};
pub use inference::{SegmentationSession, SessionFactory};
pub use models::ModelName;
pub use services::{
    BackgroundRemovalService, EncodedImage, EncodedPayload, ImageValidator, RemovalOutcome,
    ResponseEncoder, ValidatedImage,
};
pub use session_registry::{ModelSessionRegistry, RegistryStats, SessionLease};
