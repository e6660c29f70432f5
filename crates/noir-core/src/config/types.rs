//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where enhanced images are written
    pub output_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./noir-output"),
        }
    }
}

/// Input normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Longest edge after resizing, in pixels
    pub max_dimension: u32,

    /// JPEG quality used for every re-encode (1-100)
    pub jpeg_quality: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2048,
            jpeg_quality: 95,
        }
    }
}

/// Face-centered crop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Crop height as a multiple of the face height
    pub padding: f32,

    /// Target width / height of the crop window
    pub aspect_ratio: f32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            padding: 2.5,
            aspect_ratio: 0.8,
        }
    }
}

/// Resource limits to protect against problematic inputs and hung calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum input file size in megabytes
    pub max_file_size_mb: u64,

    /// Face locator call timeout in milliseconds
    pub detect_timeout_ms: u64,

    /// Enhancement call timeout in milliseconds
    pub enhance_timeout_ms: u64,

    /// Refinement call timeout in milliseconds
    pub refine_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50,
            detect_timeout_ms: 60_000,
            enhance_timeout_ms: 180_000,
            refine_timeout_ms: 180_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Gemini backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API base URL
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Image-output model used for enhancement and refinement
    pub image_model: String,

    /// Text-output model used for face detection
    pub vision_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: "${GEMINI_API_KEY}".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            vision_model: "gemini-2.5-flash".to_string(),
        }
    }
}
