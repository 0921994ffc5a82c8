//! Upload validation service
//!
//! Checks run in a fixed order and the first failure wins: payload size,
//! recognizable container, accepted format, header dimensions, then the
//! pixel decode. The size check never touches the payload contents.

use crate::{
    config::ValidationLimits,
    error::{BgRemovalError, Result},
};
use image::{DynamicImage, ImageFormat, ImageReader, Limits};
use std::io::Cursor;

/// Container formats accepted for upload
pub const ACCEPTED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// A payload that passed every check, with its decoded image
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

impl ValidatedImage {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

/// Service for validating raw uploads
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageValidator {
    limits: ValidationLimits,
}

impl ImageValidator {
    #[must_use]
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Reject payloads above the configured size without reading them
    ///
    /// # Errors
    /// - `TooLarge` when `len` exceeds `max_file_size`
    pub fn check_size(&self, len: usize) -> Result<()> {
        if len > self.limits.max_file_size {
            return Err(BgRemovalError::too_large(len, self.limits.max_file_size));
        }
        Ok(())
    }

    /// Validate raw bytes and return the decoded image
    ///
    /// Format and dimensions come from the container header; pixel data is
    /// decoded only once both are accepted.
    ///
    /// # Errors
    /// - `TooLarge` when the payload exceeds the size limit
    /// - `Undecodable` when the bytes are not a recognizable image
    /// - `UnsupportedFormat` when the container is not png, jpeg, webp, bmp or tiff
    /// - `DimensionOutOfRange` when either edge is outside the configured bounds
    pub fn validate(&self, bytes: &[u8]) -> Result<ValidatedImage> {
        self.check_size(bytes.len())?;

        let mut header = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BgRemovalError::undecodable(e.to_string()))?;
        let format = header
            .format()
            .ok_or_else(|| BgRemovalError::undecodable("Unrecognized image data"))?;

        if !ACCEPTED_FORMATS.contains(&format) {
            return Err(BgRemovalError::unsupported_format(format!(
                "{} (accepted: png, jpeg, webp, bmp, tiff)",
                format_name(format)
            )));
        }

        header.no_limits();
        let (width, height) = header
            .into_dimensions()
            .map_err(|e| BgRemovalError::undecodable(e.to_string()))?;
        self.check_dimensions(width, height)?;

        let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
        reader.limits(self.decode_limits());
        let image = reader
            .decode()
            .map_err(|e| BgRemovalError::undecodable(e.to_string()))?;

        log::debug!("Validated {} image {}x{}", format_name(format), width, height);
        Ok(ValidatedImage { image, format })
    }

    /// Check header dimensions against the configured bounds
    ///
    /// # Errors
    /// - `DimensionOutOfRange` when either edge is outside the bounds
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        let ValidationLimits {
            min_dimension,
            max_dimension,
            ..
        } = self.limits;
        if width > max_dimension || height > max_dimension {
            return Err(BgRemovalError::dimension_out_of_range(
                width,
                height,
                format!("max {max_dimension}x{max_dimension}"),
            ));
        }
        if width < min_dimension || height < min_dimension {
            return Err(BgRemovalError::dimension_out_of_range(
                width,
                height,
                format!("min {min_dimension}x{min_dimension}"),
            ));
        }
        Ok(())
    }

    /// Decoder limits matching the dimension bounds
    fn decode_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.limits.max_dimension);
        limits.max_image_height = Some(self.limits.max_dimension);
        limits
    }
}

/// Lowercase name of an image container format
#[must_use]
pub fn format_name(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("unknown")
}
