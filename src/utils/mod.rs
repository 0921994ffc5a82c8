//! Image helpers shared by the services and inference backends

pub mod compositing;
#[cfg(feature = "onnx")]
pub mod preprocessing;

pub use compositing::{apply_alpha_mask, composite_over, encode_png};
#[cfg(feature = "onnx")]
pub use preprocessing::ImagePreprocessor;
