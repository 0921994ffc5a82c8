//! Background removal orchestration
//!
//! Normalizes the input to RGB, hands a lossless PNG to the session picked
//! by the registry and decodes the cut-out it returns. All three steps run on
//! the blocking thread pool; an optional timeout abandons the request (the
//! work itself keeps running to completion).

use crate::{
    error::{BgRemovalError, Result},
    models::ModelName,
    session_registry::ModelSessionRegistry,
    utils::encode_png,
};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;

/// Result of a background removal
#[derive(Debug, Clone)]
pub struct RemovalOutcome {
    /// Cut-out image, normally RGBA
    pub image: DynamicImage,
    /// Model that actually produced the result
    pub model_used: ModelName,
    /// Whether the default model was substituted for the requested one
    pub fallback: bool,
    pub original_size: (u32, u32),
    pub output_size: (u32, u32),
}

/// Service running background removal through the session registry
pub struct BackgroundRemovalService {
    registry: Arc<ModelSessionRegistry>,
    inference_timeout: Option<Duration>,
}

impl BackgroundRemovalService {
    #[must_use]
    pub fn new(registry: Arc<ModelSessionRegistry>, inference_timeout: Option<Duration>) -> Self {
        Self {
            registry,
            inference_timeout,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModelSessionRegistry> {
        &self.registry
    }

    /// Remove the background of `image` with `model`
    ///
    /// # Errors
    /// - `RemovalFailed` when inference fails, times out or returns an
    ///   undecodable image
    /// - `RemovalFailed` when the model cannot be loaded under the strict
    ///   fallback policy
    #[tracing::instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub async fn remove_background(
        &self,
        image: DynamicImage,
        model: ModelName,
    ) -> Result<RemovalOutcome> {
        let start = instant::Instant::now();
        let original_size = (image.width(), image.height());

        let lease = self.registry.get_session(model).await?;
        let session = Arc::clone(&lease.session);
        let inference = tokio::task::spawn_blocking(move || -> Result<DynamicImage> {
            let rgb = match image {
                DynamicImage::ImageRgb8(rgb) => rgb,
                other => {
                    tracing::debug!(color = ?other.color(), "Converting input to RGB");
                    other.to_rgb8()
                },
            };
            let png = encode_png(&DynamicImage::ImageRgb8(rgb)).map_err(|e| {
                BgRemovalError::removal_failed(format!("Failed to encode input: {e}"))
            })?;

            let output = session.remove_background(&png).map_err(|e| match e {
                BgRemovalError::RemovalFailed(_) => e,
                other => BgRemovalError::removal_failed(other.to_string()),
            })?;

            image::load_from_memory(&output).map_err(|e| {
                BgRemovalError::removal_failed(format!("Inference returned an invalid image: {e}"))
            })
        });

        let joined = match self.inference_timeout {
            Some(limit) => tokio::time::timeout(limit, inference).await.map_err(|_| {
                BgRemovalError::removal_failed(format!(
                    "Inference exceeded {:.1}s timeout",
                    limit.as_secs_f64()
                ))
            })?,
            None => inference.await,
        };
        let result = joined
            .map_err(|e| BgRemovalError::removal_failed(format!("Inference task failed: {e}")))??;
        let output_size = (result.width(), result.height());

        tracing::info!(
            requested = %lease.requested,
            model_used = %lease.used,
            fallback = lease.fallback,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Background removed"
        );

        Ok(RemovalOutcome {
            image: result,
            model_used: lease.used,
            fallback: lease.fallback,
            original_size,
            output_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockSessionFactory;
    use crate::config::FallbackPolicy;
    use crate::inference::SessionFactory;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    async fn service(factory: MockSessionFactory, timeout: Option<Duration>) -> BackgroundRemovalService {
        let factory: Arc<dyn SessionFactory> = Arc::new(factory);
        let registry = ModelSessionRegistry::new(factory, FallbackPolicy::Degrade)
            .await
            .unwrap();
        BackgroundRemovalService::new(Arc::new(registry), timeout)
    }

    fn subject_on_backdrop() -> RgbImage {
        let mut image = RgbImage::from_pixel(40, 30, Rgb([250, 250, 250]));
        for y in 10..20 {
            for x in 10..30 {
                image.put_pixel(x, y, Rgb([30, 160, 60]));
            }
        }
        image
    }

    #[tokio::test]
    async fn test_remove_background_produces_cutout() {
        let service = service(MockSessionFactory::new(), None).await;
        let outcome = service
            .remove_background(DynamicImage::ImageRgb8(subject_on_backdrop()), ModelName::U2Net)
            .await
            .unwrap();

        assert_eq!(outcome.model_used, ModelName::U2Net);
        assert!(!outcome.fallback);
        assert_eq!(outcome.original_size, (40, 30));
        assert_eq!(outcome.output_size, (40, 30));

        let rgba = outcome.image.to_rgba8();
        assert_eq!(rgba.get_pixel(0, 0)[3], 0);
        assert_eq!(rgba.get_pixel(15, 15)[3], 255);
    }

    #[tokio::test]
    async fn test_grayscale_input_is_normalized() {
        let mut gray = GrayImage::from_pixel(20, 20, Luma([10]));
        gray.put_pixel(10, 10, Luma([200]));
        let service = service(MockSessionFactory::new(), None).await;

        let outcome = service
            .remove_background(DynamicImage::ImageLuma8(gray), ModelName::U2Net)
            .await
            .unwrap();
        let rgba = outcome.image.to_rgba8();
        assert_eq!(rgba.get_pixel(10, 10).0, [200, 200, 200, 255]);
        assert_eq!(rgba.get_pixel(0, 0)[3], 0);
    }

    #[tokio::test]
    async fn test_fallback_is_reported() {
        let factory = MockSessionFactory::new().failing_for(ModelName::IsNetGeneralUse);
        let service = service(factory, None).await;

        let outcome = service
            .remove_background(
                DynamicImage::ImageRgb8(subject_on_backdrop()),
                ModelName::IsNetGeneralUse,
            )
            .await
            .unwrap();
        assert!(outcome.fallback);
        assert_eq!(outcome.model_used, ModelName::U2Net);
    }

    #[tokio::test]
    async fn test_inference_failure_is_removal_failed() {
        let service = service(MockSessionFactory::new().with_inference_failure(), None).await;
        let err = service
            .remove_background(DynamicImage::ImageRgb8(subject_on_backdrop()), ModelName::U2Net)
            .await
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::RemovalFailed(_)));
    }

    #[tokio::test]
    async fn test_inference_timeout() {
        let factory = MockSessionFactory::new().with_inference_delay(Duration::from_millis(500));
        let service = service(factory, Some(Duration::from_millis(20))).await;

        let err = service
            .remove_background(DynamicImage::ImageRgb8(subject_on_backdrop()), ModelName::U2Net)
            .await
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::RemovalFailed(_)));
        assert!(err.to_string().contains("timeout"));
    }
}
