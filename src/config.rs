//! Configuration types for the background removal service

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default upload limit: 10 MiB
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Default listening port
pub const DEFAULT_PORT: u16 = 5000;

/// Accepted image edge length range (inclusive)
pub const DEFAULT_MIN_DIMENSION: u32 = 10;
pub const DEFAULT_MAX_DIMENSION: u32 = 4000;

/// Hard ceiling for `max_file_size`
const MAX_FILE_SIZE_CEILING: usize = 1024 * 1024 * 1024;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown execution provider '{other}'. Expected one of: auto, cpu, cuda, coreml"
            ))),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency (lossless)
    #[default]
    Png,
    /// JPEG, transparency composited onto white
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
}

impl OutputFormat {
    /// MIME type of the encoded output
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Canonical file extension (without the dot)
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Whether the container can carry an alpha channel
    #[must_use]
    pub fn supports_transparency(self) -> bool {
        match self {
            Self::Png | Self::WebP => true,
            Self::Jpeg => false,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            _ => Err(BgRemovalError::invalid_format(
                "Output format must be one of: png, jpg, jpeg, webp",
            )),
        }
    }
}

/// What the session registry does when a requested model cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Serve the request with the default model instead
    #[default]
    Degrade,
    /// Fail the request
    Strict,
}

impl FromStr for FallbackPolicy {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "degrade" | "default" | "fallback" => Ok(Self::Degrade),
            "strict" | "error" => Ok(Self::Strict),
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown fallback policy '{other}'. Expected 'degrade' or 'strict'"
            ))),
        }
    }
}

/// Size and dimension bounds enforced on uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    /// Maximum payload size in bytes
    pub max_file_size: usize,
    /// Minimum accepted width and height
    pub min_dimension: u32,
    /// Maximum accepted width and height
    pub max_dimension: u32,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            min_dimension: DEFAULT_MIN_DIMENSION,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl ValidationLimits {
    /// Maximum file size in MiB, as shown to API clients
    #[must_use]
    pub fn max_file_size_mb(&self) -> f64 {
        self.max_file_size as f64 / 1024.0 / 1024.0
    }
}

/// Service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Debug mode (verbose logging)
    pub debug: bool,
    /// Upload validation bounds
    pub limits: ValidationLimits,
    /// Directory holding `<model>.onnx` files
    pub model_dir: PathBuf,
    /// Download missing model files on first use
    pub auto_download: bool,
    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
    /// Abort a request whose inference exceeds this duration
    pub inference_timeout: Option<Duration>,
    /// Behavior when a requested model fails to load
    pub fallback_policy: FallbackPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            debug: false,
            limits: ValidationLimits::default(),
            model_dir: default_model_dir(),
            auto_download: true,
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
            inference_timeout: None,
            fallback_policy: FallbackPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Socket address to bind
    ///
    /// # Errors
    /// - Host is not a valid IP address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| BgRemovalError::invalid_config(format!("Invalid bind address: {e}")))
    }

    /// Check the configuration for out-of-range values
    ///
    /// # Errors
    /// - Zero or excessive `max_file_size`
    /// - Inverted or zero dimension bounds
    /// - Zero inference timeout
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_file_size == 0 || self.limits.max_file_size > MAX_FILE_SIZE_CEILING {
            return Err(BgRemovalError::config_value_error(
                "max_file_size",
                self.limits.max_file_size,
                &format!("1-{MAX_FILE_SIZE_CEILING}"),
            ));
        }
        if self.limits.min_dimension == 0 || self.limits.min_dimension > self.limits.max_dimension {
            return Err(BgRemovalError::invalid_config(format!(
                "Invalid dimension bounds: min {} must be in 1..={}",
                self.limits.min_dimension, self.limits.max_dimension
            )));
        }
        if self.inference_timeout == Some(Duration::ZERO) {
            return Err(BgRemovalError::invalid_config(
                "Inference timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Default model directory: `$U2NET_HOME`, else `~/.u2net`
#[must_use]
pub fn default_model_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("U2NET_HOME") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".u2net")
}

/// Builder for `ServerConfig`
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    #[must_use]
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    #[must_use]
    pub fn max_file_size(mut self, bytes: usize) -> Self {
        self.config.limits.max_file_size = bytes;
        self
    }

    #[must_use]
    pub fn dimension_bounds(mut self, min: u32, max: u32) -> Self {
        self.config.limits.min_dimension = min;
        self.config.limits.max_dimension = max;
        self
    }

    #[must_use]
    pub fn model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.model_dir = dir.into();
        self
    }

    #[must_use]
    pub fn auto_download(mut self, enabled: bool) -> Self {
        self.config.auto_download = enabled;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Use the same thread count for intra- and inter-op parallelism
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self.config.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn inference_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.inference_timeout = timeout;
        self
    }

    #[must_use]
    pub fn fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.config.fallback_policy = policy;
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    /// - Any check in [`ServerConfig::validate`] fails
    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
