//! Background Remover API server
//!
//! Every option can also be given through its environment variable.

use super::config::CliConfigBuilder;
use crate::{
    api::{serve, AppState},
    backends::MockSessionFactory,
    inference::SessionFactory,
    session_registry::ModelSessionRegistry,
    tracing_config::{TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{builder::BoolishValueParser, ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

/// Background removal HTTP service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-api")]
pub struct Cli {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, env = "PORT", default_value_t = crate::config::DEFAULT_PORT)]
    pub port: u16,

    /// Verbose logging
    #[arg(
        long,
        env = "DEBUG",
        action = ArgAction::Set,
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub debug: bool,

    /// Maximum upload size in bytes
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = crate::config::DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: usize,

    /// Directory holding `<model>.onnx` files [default: $U2NET_HOME or ~/.u2net]
    #[arg(long, env = "MODEL_DIR", value_name = "PATH")]
    pub model_dir: Option<PathBuf>,

    /// Download missing model files on first use
    #[arg(
        long,
        env = "AUTO_DOWNLOAD",
        action = ArgAction::Set,
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    pub auto_download: bool,

    /// Execution provider (auto, cpu, cuda, coreml)
    #[arg(long, env = "EXECUTION_PROVIDER", default_value = "auto")]
    pub execution_provider: String,

    /// Inference threads (0 = auto)
    #[arg(short, long, env = "INFERENCE_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Abort inference that takes longer than this many seconds
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS")]
    pub inference_timeout_secs: Option<u64>,

    /// Behavior when a requested model fails to load (degrade, strict)
    #[arg(long, env = "MODEL_FALLBACK", default_value = "degrade")]
    pub model_fallback: String,

    /// Inference backend
    #[arg(long, value_enum, default_value_t = CliBackend::Onnx)]
    pub backend: CliBackend,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    /// ONNX Runtime with U2-Net family models
    Onnx,
    /// Deterministic backend without model files
    Mock,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    /// Requires the `tracing-json` feature
    Json,
}

impl CliLogFormat {
    fn tracing_format(self) -> Result<TracingFormat> {
        match self {
            Self::Console => Ok(TracingFormat::Console),
            Self::Compact => Ok(TracingFormat::Compact),
            #[cfg(feature = "tracing-json")]
            Self::Json => Ok(TracingFormat::Json),
            #[cfg(not(feature = "tracing-json"))]
            Self::Json => {
                anyhow::bail!("JSON logs not compiled in. Rebuild with --features tracing-json")
            },
        }
    }
}

/// Main entry point for the server binary
pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    TracingConfig::new()
        .with_debug(cli.debug)
        .with_format(cli.log_format.tracing_format()?)
        .init()
        .context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Invalid configuration")?;
    tracing::info!(
        backend = ?cli.backend,
        provider = %config.execution_provider,
        model_dir = %config.model_dir.display(),
        max_file_size = config.limits.max_file_size,
        "Configuration loaded"
    );

    let factory = create_factory(cli.backend, &config)?;
    let registry = ModelSessionRegistry::new(factory, config.fallback_policy)
        .await
        .context("Failed to load the default model")?;
    let state = AppState::new(Arc::new(registry), &config);

    serve(&config, state, shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

fn create_factory(
    backend: CliBackend,
    config: &crate::config::ServerConfig,
) -> Result<Arc<dyn SessionFactory>> {
    match backend {
        CliBackend::Mock => {
            log::warn!("⚠️  Using the mock backend, results are not model output");
            Ok(Arc::new(MockSessionFactory::new()))
        },
        #[cfg(feature = "onnx")]
        CliBackend::Onnx => Ok(Arc::new(
            crate::backends::OnnxSessionFactory::from_config(config)
                .context("Failed to create ONNX session factory")?,
        )),
        #[cfg(not(feature = "onnx"))]
        CliBackend::Onnx => {
            let _ = config;
            anyhow::bail!("ONNX backend not compiled in. Rebuild with --features onnx")
        },
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
