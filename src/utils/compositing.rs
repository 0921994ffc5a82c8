//! Alpha mask application and flattening

use crate::error::{BgRemovalError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

/// Build an RGBA cut-out: color from `image`, alpha from `mask`
///
/// # Errors
/// - Mask dimensions differ from the image dimensions
pub fn apply_alpha_mask(image: &RgbImage, mask: &GrayImage) -> Result<RgbaImage> {
    if image.dimensions() != mask.dimensions() {
        return Err(BgRemovalError::removal_failed(format!(
            "Mask size {:?} does not match image size {:?}",
            mask.dimensions(),
            image.dimensions()
        )));
    }

    let (width, height) = image.dimensions();
    let mut result = RgbaImage::new(width, height);
    for ((src, alpha), dst) in image
        .pixels()
        .zip(mask.pixels())
        .zip(result.pixels_mut())
    {
        *dst = Rgba([src[0], src[1], src[2], alpha[0]]);
    }
    Ok(result)
}

/// Flatten an RGBA image onto an opaque background color
///
/// Each channel is blended as `fg * a + bg * (1 - a)`.
#[must_use]
pub fn composite_over(image: &RgbaImage, background: [u8; 3]) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut canvas = RgbImage::from_pixel(width, height, Rgb(background));
    for (src, dst) in image.pixels().zip(canvas.pixels_mut()) {
        let alpha = u32::from(src[3]);
        for channel in 0..3 {
            let fg = u32::from(src[channel]);
            let bg = u32::from(background[channel]);
            dst.0[channel] = ((fg * alpha + bg * (255 - alpha) + 127) / 255) as u8;
        }
    }
    canvas
}

/// Encode an image as PNG in memory
///
/// # Errors
/// - PNG encoder failure
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
