//! Mock backend for testing and running without model files
//!
//! The mock session keys out every pixel whose color is close to the
//! top-left corner pixel. On a flat backdrop this produces a clean cut-out,
//! which is enough to exercise the whole request pipeline deterministically.

use crate::error::{BgRemovalError, Result};
use crate::inference::{SegmentationSession, SessionFactory};
use crate::models::ModelName;
use crate::utils::{apply_alpha_mask, encode_png};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma, Rgb};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Summed per-channel distance below which a pixel counts as backdrop
const BACKDROP_TOLERANCE: u32 = 48;

/// Factory producing [`MockSession`]s
#[derive(Debug, Default)]
pub struct MockSessionFactory {
    failing: HashSet<ModelName>,
    construction_delay: Duration,
    inference_delay: Duration,
    inference_failure: bool,
    constructions: Mutex<HashMap<ModelName, usize>>,
}

impl MockSessionFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make construction fail for `model`
    #[must_use]
    pub fn failing_for(mut self, model: ModelName) -> Self {
        self.failing.insert(model);
        self
    }

    /// Sleep before every construction
    #[must_use]
    pub fn with_construction_delay(mut self, delay: Duration) -> Self {
        self.construction_delay = delay;
        self
    }

    /// Block the inference thread for `delay` on every call
    #[must_use]
    pub fn with_inference_delay(mut self, delay: Duration) -> Self {
        self.inference_delay = delay;
        self
    }

    /// Make every inference call fail
    #[must_use]
    pub fn with_inference_failure(mut self) -> Self {
        self.inference_failure = true;
        self
    }

    /// Number of construction attempts for `model`, failed ones included
    #[must_use]
    pub fn construction_count(&self, model: ModelName) -> usize {
        self.constructions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&model)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create_session(&self, model: ModelName) -> Result<Arc<dyn SegmentationSession>> {
        *self
            .constructions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(model)
            .or_insert(0) += 1;

        if !self.construction_delay.is_zero() {
            tokio::time::sleep(self.construction_delay).await;
        }

        if self.failing.contains(&model) {
            log::warn!("Mock construction failure for {model}");
            return Err(BgRemovalError::session_construction(
                model.as_str(),
                "mock construction failure",
            ));
        }

        log::debug!("Created mock session for {model}");
        Ok(Arc::new(MockSession {
            model,
            inference_delay: self.inference_delay,
            inference_failure: self.inference_failure,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}

/// Deterministic corner-keyed segmentation session
#[derive(Debug)]
pub struct MockSession {
    model: ModelName,
    inference_delay: Duration,
    inference_failure: bool,
}

impl SegmentationSession for MockSession {
    fn model(&self) -> ModelName {
        self.model
    }

    fn remove_background(&self, png_bytes: &[u8]) -> Result<Vec<u8>> {
        if !self.inference_delay.is_zero() {
            std::thread::sleep(self.inference_delay);
        }
        if self.inference_failure {
            return Err(BgRemovalError::removal_failed("mock inference failure"));
        }

        let rgb = image::load_from_memory(png_bytes)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let backdrop = rgb.get_pixel_checked(0, 0).copied().unwrap_or(Rgb([0, 0, 0]));

        let mut mask = GrayImage::new(width, height);
        for (src, dst) in rgb.pixels().zip(mask.pixels_mut()) {
            let distance: u32 = src
                .0
                .iter()
                .zip(backdrop.0.iter())
                .map(|(a, b)| u32::from(a.abs_diff(*b)))
                .sum();
            *dst = Luma([if distance > BACKDROP_TOLERANCE { 255 } else { 0 }]);
        }

        let cutout = apply_alpha_mask(&rgb, &mask)?;
        encode_png(&DynamicImage::ImageRgba8(cutout))
    }
}
