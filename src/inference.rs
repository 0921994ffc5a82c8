//! Inference session abstraction
//!
//! Segmentation is delegated to an inference runtime through two narrow
//! traits: a factory that builds one session per model, and the session
//! itself, which turns a lossless image into a cut-out.

use crate::{error::Result, models::ModelName};
use async_trait::async_trait;
use std::sync::Arc;

/// A constructed, reusable inference session bound to a single model
///
/// Sessions are shared across requests, so implementations must tolerate
/// concurrent calls.
pub trait SegmentationSession: Send + Sync {
    /// Model this session was built for
    fn model(&self) -> ModelName;

    /// Remove the background from a PNG-encoded RGB image
    ///
    /// Returns PNG bytes of an RGBA image with the background transparent.
    ///
    /// # Errors
    /// - Input cannot be decoded
    /// - Runtime inference failure
    /// - Output tensor has an unexpected shape
    fn remove_background(&self, png_bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Builds inference sessions
///
/// Construction can be slow (model download, graph optimization), so it is
/// asynchronous; the registry guarantees it runs at most once per model.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Construct a session for the given model
    ///
    /// # Errors
    /// - Model file missing and cannot be downloaded
    /// - Runtime rejects the model
    async fn create_session(&self, model: ModelName) -> Result<Arc<dyn SegmentationSession>>;

    /// Short name of the backing runtime, for logs and health output
    fn backend_name(&self) -> &'static str;
}
