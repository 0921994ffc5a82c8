//! Response encoding service
//!
//! Turns a processed image into the bytes of the requested container, either
//! as a raw payload or as a `data:` URL. Formats that cannot carry
//! transparency are flattened onto white first.

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
    utils::{composite_over, encode_png},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use std::io::Cursor;

/// Quality used for the lossy encoders (JPEG, WebP)
pub const OUTPUT_QUALITY: u8 = 95;

/// Backdrop for formats without an alpha channel
const FLATTEN_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Encoded body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedPayload {
    /// Raw container bytes
    Binary(Vec<u8>),
    /// `data:<mime>;base64,<payload>`
    DataUrl(String),
}

/// An encoded image ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub payload: EncodedPayload,
    pub mime_type: &'static str,
    pub format: OutputFormat,
}

/// Service for encoding processed images into response payloads
pub struct ResponseEncoder;

impl ResponseEncoder {
    /// Encode an image for the response
    ///
    /// # Errors
    /// - Underlying codec failure
    pub fn encode(
        image: &DynamicImage,
        format: OutputFormat,
        want_base64: bool,
    ) -> Result<EncodedImage> {
        let bytes = Self::encode_bytes(image, format)?;
        let payload = if want_base64 {
            EncodedPayload::DataUrl(Self::to_data_url(&bytes, format))
        } else {
            EncodedPayload::Binary(bytes)
        };
        Ok(EncodedImage {
            payload,
            mime_type: format.mime_type(),
            format,
        })
    }

    /// Encode an image into raw container bytes
    ///
    /// # Errors
    /// - Underlying codec failure
    pub fn encode_bytes(image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Png => encode_png(image),
            OutputFormat::Jpeg => {
                let rgb = if image.color().has_alpha() {
                    composite_over(&image.to_rgba8(), FLATTEN_BACKGROUND)
                } else {
                    image.to_rgb8()
                };
                let mut buffer = Cursor::new(Vec::new());
                JpegEncoder::new_with_quality(&mut buffer, OUTPUT_QUALITY)
                    .encode_image(&rgb)
                    .map_err(|e| BgRemovalError::internal(format!("Failed to encode JPEG: {e}")))?;
                Ok(buffer.into_inner())
            },
            OutputFormat::WebP => {
                let rgba = image.to_rgba8();
                let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
                    .encode(f32::from(OUTPUT_QUALITY));
                Ok(encoded.to_vec())
            },
        }
    }

    /// Wrap encoded bytes in a `data:` URL
    #[must_use]
    pub fn to_data_url(bytes: &[u8], format: OutputFormat) -> String {
        format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes))
    }
}
