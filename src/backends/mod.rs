//! Inference backend implementations
//!
//! - ONNX Runtime backend (U2-Net family models, CPU/CUDA/CoreML)
//! - Mock backend (deterministic, no model files)

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use self::mock::{MockSession, MockSessionFactory};

#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxSession, OnnxSessionFactory, OnnxSessionOptions};
