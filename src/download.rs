//! Model file resolution and downloading
//!
//! Model files live flat in a single directory as `<model>.onnx`. A missing
//! file is fetched from the published release URL when auto-download is
//! enabled. Downloads stream into a `.part` file which is renamed into place
//! only after the body has been fully written, so a partial download is
//! never mistaken for a model.

use crate::error::{BgRemovalError, Result};
use crate::models::ModelName;
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Model downloader bound to a model directory
#[derive(Debug, Clone)]
pub struct ModelDownloader {
    client: Client,
    model_dir: PathBuf,
    auto_download: bool,
}

impl ModelDownloader {
    /// Create a new model downloader
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new<P: Into<PathBuf>>(model_dir: P, auto_download: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            model_dir: model_dir.into(),
            auto_download,
        })
    }

    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Expected location of a model file
    #[must_use]
    pub fn model_path(&self, model: ModelName) -> PathBuf {
        self.model_dir.join(model.file_name())
    }

    /// Whether the model file is already present
    #[must_use]
    pub fn is_available(&self, model: ModelName) -> bool {
        self.model_path(model).is_file()
    }

    /// Return the path of the model file, downloading it if needed
    ///
    /// # Errors
    /// - `SessionConstructionFailed` when the file is missing and auto-download is off
    /// - Network or file system errors during the download
    pub async fn ensure_model(&self, model: ModelName) -> Result<PathBuf> {
        let path = self.model_path(model);
        if path.is_file() {
            log::debug!("Using cached model file {}", path.display());
            return Ok(path);
        }

        if !self.auto_download {
            return Err(BgRemovalError::session_construction(
                model.as_str(),
                format!(
                    "Model file {} not found and auto-download is disabled",
                    path.display()
                ),
            ));
        }

        log::info!("📥 Downloading model {model} to {}", path.display());
        let start = instant::Instant::now();
        let temp_path = path.with_extension("onnx.part");

        if let Err(e) = self.download_file(&model.download_url(), &temp_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("move downloaded model", &path, &e))?;

        log::info!(
            "✅ Model {model} downloaded in {:.1}s",
            start.elapsed().as_secs_f64()
        );
        Ok(path)
    }

    /// Stream a URL into a local file
    async fn download_file(&self, url: &str, local_path: &Path) -> Result<()> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BgRemovalError::file_io_error("create directory", parent, &e))?;
        }

        let response =
            self.client.get(url).send().await.map_err(|e| {
                BgRemovalError::network_error(format!("Failed to download {url}"), e)
            })?;

        if !response.status().is_success() {
            return Err(BgRemovalError::network_error(
                format!("HTTP error for {url}"),
                response.status(),
            ));
        }

        let total_size = response.content_length();
        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(std::io::Error::other),
        );

        let downloaded = tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", local_path, &e))?;

        if let Some(total) = total_size {
            if total != downloaded {
                return Err(BgRemovalError::network_error(
                    format!("Incomplete download of {url}"),
                    format!("received {downloaded} of {total} bytes"),
                ));
            }
        }

        log::debug!(
            "Downloaded {} bytes to {}",
            downloaded,
            local_path.display()
        );
        Ok(())
    }
}
