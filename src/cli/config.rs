//! Conversion of command-line arguments into a [`ServerConfig`]

use crate::cli::main_impl::Cli;
use crate::config::{ExecutionProvider, FallbackPolicy, ServerConfig};
use anyhow::{Context, Result};
use std::time::Duration;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a validated [`ServerConfig`] from parsed arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServerConfig> {
        let execution_provider: ExecutionProvider = cli
            .execution_provider
            .parse()
            .context("Invalid EXECUTION_PROVIDER")?;
        let fallback_policy: FallbackPolicy = cli
            .model_fallback
            .parse()
            .context("Invalid MODEL_FALLBACK")?;

        let mut builder = ServerConfig::builder()
            .host(cli.host.clone())
            .port(cli.port)
            .debug(cli.debug)
            .max_file_size(cli.max_file_size)
            .auto_download(cli.auto_download)
            .execution_provider(execution_provider)
            .threads(cli.threads)
            .inference_timeout(cli.inference_timeout_secs.map(Duration::from_secs))
            .fallback_policy(fallback_policy);

        if let Some(dir) = &cli.model_dir {
            builder = builder.model_dir(dir.clone());
        }

        Ok(builder.build()?)
    }
}
