//! Request pipeline services
//!
//! - [`ImageValidator`]: raw bytes to a decoded, accepted image
//! - [`BackgroundRemovalService`]: image to cut-out via the session registry
//! - [`ResponseEncoder`]: cut-out to response bytes or data URL

pub mod format;
pub mod removal;
pub mod validator;

pub use format::{EncodedImage, EncodedPayload, ResponseEncoder, OUTPUT_QUALITY};
pub use removal::{BackgroundRemovalService, RemovalOutcome};
pub use validator::{format_name, ImageValidator, ValidatedImage, ACCEPTED_FORMATS};

use crate::error::{BgRemovalError, Result};

/// Run CPU-bound work on the blocking thread pool
///
/// # Errors
/// - Whatever `work` returns
/// - `Internal` when the task panics or is cancelled
pub async fn run_blocking<T, F>(task: &'static str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BgRemovalError::internal(format!("{task} task failed: {e}")))?
}
