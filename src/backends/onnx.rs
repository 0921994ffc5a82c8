//! ONNX Runtime backend for the U2-Net model family
//!
//! Sessions are built from `<model>.onnx` files resolved (and downloaded when
//! allowed) by [`ModelDownloader`], with the configured execution provider
//! and thread counts. Running a session needs exclusive access, so each
//! [`OnnxSession`] keeps its runtime session behind a mutex that is held only
//! for the duration of a single `run` call.

use crate::config::{ExecutionProvider, ServerConfig};
use crate::download::ModelDownloader;
use crate::error::{BgRemovalError, Result};
use crate::inference::{SegmentationSession, SessionFactory};
use crate::models::ModelName;
use crate::utils::{apply_alpha_mask, encode_png, ImagePreprocessor};
use async_trait::async_trait;
use image::DynamicImage;
use ndarray::{Array2, Array4, ArrayD, Axis, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Session construction options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OnnxSessionOptions {
    pub execution_provider: ExecutionProvider,
    /// Intra-op threads (0 = all available cores)
    pub intra_threads: usize,
    /// Inter-op threads (0 = a quarter of available cores)
    pub inter_threads: usize,
}

impl From<&ServerConfig> for OnnxSessionOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            execution_provider: config.execution_provider,
            intra_threads: config.intra_threads,
            inter_threads: config.inter_threads,
        }
    }
}

/// Factory building ONNX Runtime sessions from model files
#[derive(Debug)]
pub struct OnnxSessionFactory {
    downloader: ModelDownloader,
    options: OnnxSessionOptions,
}

impl OnnxSessionFactory {
    #[must_use]
    pub fn new(downloader: ModelDownloader, options: OnnxSessionOptions) -> Self {
        Self {
            downloader,
            options,
        }
    }

    /// Build a factory from the service configuration
    ///
    /// # Errors
    /// - Failed to create the download client
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let downloader = ModelDownloader::new(&config.model_dir, config.auto_download)?;
        Ok(Self::new(downloader, OnnxSessionOptions::from(config)))
    }
}

#[async_trait]
impl SessionFactory for OnnxSessionFactory {
    async fn create_session(&self, model: ModelName) -> Result<Arc<dyn SegmentationSession>> {
        let path = self.downloader.ensure_model(model).await.map_err(|e| match e {
            BgRemovalError::SessionConstructionFailed { .. } => e,
            other => BgRemovalError::session_construction(model.as_str(), other.to_string()),
        })?;

        let options = self.options;
        let session = tokio::task::spawn_blocking(move || build_session(&path, options))
            .await
            .map_err(|e| {
                BgRemovalError::session_construction(
                    model.as_str(),
                    format!("Session construction task failed: {e}"),
                )
            })?
            .map_err(|e| BgRemovalError::session_construction(model.as_str(), e.to_string()))?;

        Ok(Arc::new(OnnxSession {
            model,
            session: Mutex::new(session),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "onnx"
    }
}

/// Apply the requested execution provider, falling back to CPU when unavailable
fn configure_provider(
    builder: SessionBuilder,
    provider: ExecutionProvider,
) -> Result<SessionBuilder> {
    let cuda_available =
        || OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
    let coreml_available = || {
        OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
    };

    let mut providers = Vec::new();
    match provider {
        ExecutionProvider::Auto => {
            if cuda_available() {
                log::info!("🚀 CUDA execution provider is available and will be used");
                providers.push(CUDAExecutionProvider::default().build());
            }
            if coreml_available() {
                log::info!("🍎 CoreML execution provider is available and will be used");
                providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
            }
            if providers.is_empty() {
                log::info!("No hardware acceleration available, using CPU");
            }
        },
        ExecutionProvider::Cpu => {
            log::info!("Using CPU execution provider");
        },
        ExecutionProvider::Cuda => {
            if cuda_available() {
                log::info!("Using CUDA execution provider");
                providers.push(CUDAExecutionProvider::default().build());
            } else {
                log::warn!(
                    "CUDA execution provider requested but not available, falling back to CPU"
                );
            }
        },
        ExecutionProvider::CoreMl => {
            if coreml_available() {
                log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
            } else {
                log::warn!(
                    "CoreML execution provider requested but not available, falling back to CPU"
                );
            }
        },
    }

    if providers.is_empty() {
        return Ok(builder);
    }
    builder.with_execution_providers(providers).map_err(|e| {
        BgRemovalError::internal(format!("Failed to set execution providers: {e}"))
    })
}

/// Build a runtime session for a model file
fn build_session(path: &Path, options: OnnxSessionOptions) -> Result<Session> {
    let start = instant::Instant::now();
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(8);
    let intra_threads = if options.intra_threads > 0 {
        options.intra_threads
    } else {
        cores
    };
    let inter_threads = if options.inter_threads > 0 {
        options.inter_threads
    } else {
        (cores / 4).max(1)
    };

    let builder = Session::builder()
        .map_err(|e| BgRemovalError::internal(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| BgRemovalError::internal(format!("Failed to set optimization level: {e}")))?;

    let session = configure_provider(builder, options.execution_provider)?
        .with_parallel_execution(true)
        .map_err(|e| BgRemovalError::internal(format!("Failed to enable parallel execution: {e}")))?
        .with_intra_threads(intra_threads)
        .map_err(|e| BgRemovalError::internal(format!("Failed to set intra threads: {e}")))?
        .with_inter_threads(inter_threads)
        .map_err(|e| BgRemovalError::internal(format!("Failed to set inter threads: {e}")))?
        .commit_from_file(path)
        .map_err(|e| {
            BgRemovalError::internal(format!(
                "Failed to load model {}: {e}",
                path.display()
            ))
        })?;

    log::debug!(
        "Session for {} ready: provider {}, {intra_threads} intra-op / {inter_threads} inter-op threads",
        path.display(),
        options.execution_provider
    );
    log::info!(
        "📊 Model loading complete: {:.0}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(session)
}

/// ONNX Runtime session for one model
pub struct OnnxSession {
    model: ModelName,
    session: Mutex<Session>,
}

impl OnnxSession {
    /// Run the model and copy out its first output
    fn infer(&self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        let start = instant::Instant::now();
        let input_value = Value::from_array(input).map_err(|e| {
            BgRemovalError::removal_failed(format!("Failed to convert input tensor: {e}"))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| BgRemovalError::internal("ONNX session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::removal_failed(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| BgRemovalError::removal_failed("No output tensors found"))?;
        let output = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::removal_failed("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                BgRemovalError::removal_failed(format!("Failed to extract output tensor: {e}"))
            })?
            .to_owned();

        log::debug!(
            "⚡ {} inference: {:.2}ms, output shape {:?}",
            self.model,
            start.elapsed().as_secs_f64() * 1000.0,
            output.shape()
        );
        Ok(output)
    }
}

impl SegmentationSession for OnnxSession {
    fn model(&self) -> ModelName {
        self.model
    }

    fn remove_background(&self, png_bytes: &[u8]) -> Result<Vec<u8>> {
        let rgb = image::load_from_memory(png_bytes)?.to_rgb8();
        let input = ImagePreprocessor::image_to_tensor(&rgb, &self.model.preprocessing());

        let scores = self.infer(input)?.into_dimensionality::<Ix4>().map_err(|e| {
            BgRemovalError::removal_failed(format!("Expected 4D output tensor: {e}"))
        })?;
        let (batch, channels, _, _) = scores.dim();
        if batch == 0 || channels == 0 {
            return Err(BgRemovalError::removal_failed(format!(
                "Empty output tensor with shape {:?}",
                scores.shape()
            )));
        }

        let prediction: Array2<f32> = if self.model.is_multiclass() {
            ImagePreprocessor::foreground_from_classes(&scores)?
        } else {
            scores
                .index_axis(Axis(0), 0)
                .index_axis(Axis(0), 0)
                .to_owned()
        };

        let mask = ImagePreprocessor::prediction_to_mask(prediction.view(), rgb.dimensions())?;
        let cutout = apply_alpha_mask(&rgb, &mask)?;
        encode_png(&DynamicImage::ImageRgba8(cutout))
    }
}
