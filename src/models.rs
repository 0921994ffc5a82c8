//! Supported segmentation model variants
//!
//! The set of models is closed: every request names one of these variants
//! (or gets the default), and anything else is rejected at the boundary
//! before a session is looked up.

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base URL of the published ONNX model files
const MODEL_RELEASE_BASE_URL: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

/// ImageNet normalization shared by the U2-Net family
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Enumerated segmentation model variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelName {
    /// General purpose background removal (default)
    #[serde(rename = "u2net")]
    U2Net,
    /// Lightweight version of u2net
    #[serde(rename = "u2netp")]
    U2NetP,
    /// Optimized for human subjects
    #[serde(rename = "u2net_human_seg")]
    U2NetHumanSeg,
    /// Optimized for clothing items
    #[serde(rename = "u2net_cloth_seg")]
    U2NetClothSeg,
    /// High accuracy general use model
    #[serde(rename = "isnet-general-use")]
    IsNetGeneralUse,
}

/// Preprocessing parameters for a model's input tensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessingConfig {
    /// Square input edge length in pixels
    pub input_size: u32,
    /// Per-channel mean (RGB)
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation (RGB)
    pub normalization_std: [f32; 3],
}

impl ModelName {
    /// All supported models, default first
    pub const ALL: [ModelName; 5] = [
        Self::U2Net,
        Self::U2NetP,
        Self::U2NetHumanSeg,
        Self::U2NetClothSeg,
        Self::IsNetGeneralUse,
    ];

    /// Model used when a request does not name one, and the fallback target
    pub const DEFAULT: ModelName = Self::U2Net;

    /// Wire name of the model
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::U2Net => "u2net",
            Self::U2NetP => "u2netp",
            Self::U2NetHumanSeg => "u2net_human_seg",
            Self::U2NetClothSeg => "u2net_cloth_seg",
            Self::IsNetGeneralUse => "isnet-general-use",
        }
    }

    /// Human-readable description served on `/models`
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::U2Net => "General purpose background removal",
            Self::U2NetP => "Lightweight version of u2net",
            Self::U2NetHumanSeg => "Optimized for human subjects",
            Self::U2NetClothSeg => "Optimized for clothing items",
            Self::IsNetGeneralUse => "High accuracy general use model",
        }
    }

    /// File name of the model inside the model directory
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.as_str())
    }

    /// Download URL of the published model file
    #[must_use]
    pub fn download_url(self) -> String {
        format!("{MODEL_RELEASE_BASE_URL}/{}", self.file_name())
    }

    /// Input tensor preprocessing for this model
    #[must_use]
    pub fn preprocessing(self) -> PreprocessingConfig {
        match self {
            Self::U2Net | Self::U2NetP | Self::U2NetHumanSeg => PreprocessingConfig {
                input_size: 320,
                normalization_mean: IMAGENET_MEAN,
                normalization_std: IMAGENET_STD,
            },
            Self::U2NetClothSeg => PreprocessingConfig {
                input_size: 768,
                normalization_mean: IMAGENET_MEAN,
                normalization_std: IMAGENET_STD,
            },
            Self::IsNetGeneralUse => PreprocessingConfig {
                input_size: 1024,
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
        }
    }

    /// Whether the model emits per-class scores rather than a single saliency map
    #[must_use]
    pub fn is_multiclass(self) -> bool {
        matches!(self, Self::U2NetClothSeg)
    }

    /// Comma-separated list of model names, for error messages
    #[must_use]
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ModelName {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelName {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                BgRemovalError::invalid_model(format!(
                    "Model must be one of: [{}]",
                    Self::supported_list()
                ))
            })
    }
}
