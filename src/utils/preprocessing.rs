//! Tensor conversion for segmentation models
//!
//! Input images are resized straight to the model's square input (no
//! letterboxing), scaled by their brightest channel value and normalized per
//! channel. Model output is min-max normalized into an 8-bit mask and resized
//! back to the source dimensions.

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, GrayImage, RgbImage};
use ndarray::{Array4, ArrayView2};

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Convert an RGB image into a normalized NCHW tensor
    #[allow(clippy::indexing_slicing)] // Tensor is allocated to the resized image's dimensions
    #[must_use]
    pub fn image_to_tensor(image: &RgbImage, config: &PreprocessingConfig) -> Array4<f32> {
        let size = config.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Lanczos3);

        let max_value = resized
            .as_raw()
            .iter()
            .copied()
            .max()
            .map_or(1e-6, |v| f32::from(v).max(1e-6));

        let size = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / max_value;
                tensor[[0, channel, y as usize, x as usize]] = (value
                    - config.normalization_mean[channel])
                    / config.normalization_std[channel];
            }
        }
        tensor
    }

    /// Collapse a `[1, C, H, W]` class-score tensor into foreground probability
    ///
    /// Channel 0 is the background class; the result is `1 - softmax(bg)`.
    ///
    /// # Errors
    /// - Tensor is not 4-dimensional or has fewer than two classes
    pub fn foreground_from_classes(scores: &Array4<f32>) -> Result<ndarray::Array2<f32>> {
        let (batch, classes, height, width) = scores.dim();
        if batch == 0 || classes < 2 {
            return Err(BgRemovalError::removal_failed(format!(
                "Expected class scores with at least 2 channels, got shape {:?}",
                scores.shape()
            )));
        }

        let mut foreground = ndarray::Array2::<f32>::zeros((height, width));
        for ((y, x), out) in foreground.indexed_iter_mut() {
            let logits: Vec<f32> = (0..classes)
                .filter_map(|c| scores.get([0, c, y, x]).copied())
                .collect();
            let peak = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let total: f32 = logits.iter().map(|l| (l - peak).exp()).sum();
            let background = logits.first().map_or(0.0, |l| (l - peak).exp() / total);
            *out = 1.0 - background;
        }
        Ok(foreground)
    }

    /// Convert a prediction map into an 8-bit mask at the given size
    ///
    /// Values are min-max normalized so the weakest prediction becomes fully
    /// transparent and the strongest fully opaque.
    ///
    /// # Errors
    /// - Prediction map is empty
    pub fn prediction_to_mask(
        prediction: ArrayView2<'_, f32>,
        target_dimensions: (u32, u32),
    ) -> Result<GrayImage> {
        let (height, width) = prediction.dim();
        if height == 0 || width == 0 {
            return Err(BgRemovalError::removal_failed("Model returned an empty prediction"));
        }

        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = (max - min).max(f32::EPSILON);

        let mut mask = GrayImage::new(width as u32, height as u32);
        for (x, y, pixel) in mask.enumerate_pixels_mut() {
            let value = prediction
                .get([y as usize, x as usize])
                .copied()
                .unwrap_or(min);
            let normalized = ((value - min) / range).clamp(0.0, 1.0);
            pixel.0[0] = (normalized * 255.0) as u8;
        }

        let (target_width, target_height) = target_dimensions;
        if (target_width, target_height) == (width as u32, height as u32) {
            return Ok(mask);
        }
        Ok(image::imageops::resize(
            &mask,
            target_width,
            target_height,
            FilterType::Lanczos3,
        ))
    }
}
