//! Adapter traits and request types.
//!
//! Defines the three external-service boundaries the pipeline calls into,
//! plus the factory that builds the configured backend.

use crate::config::GeminiConfig;
use crate::error::{ConfigError, PipelineResult};
use crate::style::StyleConfig;
use crate::types::{FaceRegion, ImageFile};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;

/// Base64-encoded image ready to embed in a JSON request body.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    pub fn from_file(file: &ImageFile) -> Self {
        let media_type = match file.mime_type() {
            "image/jpg" => "image/jpeg".to_string(),
            other => other.to_string(),
        };
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(file.bytes()),
            media_type,
        }
    }
}

/// Options that change how a refinement is carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefineOptions {
    /// Ask the backend for a slower, more deliberate edit
    pub think_harder: bool,
}

/// A refinement request for exactly one target image.
#[derive(Debug, Clone)]
pub struct RefineRequest {
    /// The previously enhanced image to revise
    pub target: ImageFile,
    /// Additional images the instruction may refer to
    pub references: Vec<ImageFile>,
    /// Free-text instruction from the user
    pub instruction: String,
    pub options: RefineOptions,
}

/// Locates faces in an image.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the pipeline holds `Arc<dyn FaceLocator>`).
#[async_trait]
pub trait FaceLocator: Send + Sync {
    /// Backend name for logging (e.g., "gemini").
    fn name(&self) -> &str;

    /// Return every face found, in a stable order, as normalized regions.
    async fn locate_faces(&self, image: &ImageFile) -> PipelineResult<Vec<FaceRegion>>;
}

/// Turns a processed portrait into a stylized black-and-white image.
#[async_trait]
pub trait Enhancer: Send + Sync {
    fn name(&self) -> &str;

    /// One independent attempt; nothing is cached or retried.
    async fn enhance(&self, image: &ImageFile, style: &StyleConfig) -> PipelineResult<ImageFile>;
}

/// Revises an already enhanced image from a free-text instruction.
#[async_trait]
pub trait Refiner: Send + Sync {
    fn name(&self) -> &str;

    async fn refine(&self, request: &RefineRequest) -> PipelineResult<ImageFile>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// The three adapters a pipeline needs, possibly backed by one client.
#[derive(Clone)]
pub struct AdapterSet {
    pub locator: Arc<dyn FaceLocator>,
    pub enhancer: Arc<dyn Enhancer>,
    pub refiner: Arc<dyn Refiner>,
}

impl AdapterSet {
    /// Use a single backend for all three roles.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: FaceLocator + Enhancer + Refiner + 'static,
    {
        Self {
            locator: backend.clone(),
            enhancer: backend.clone(),
            refiner: backend,
        }
    }
}

/// Factory that creates the configured adapters.
pub struct AdapterFactory;

impl AdapterFactory {
    /// Build the Gemini-backed adapter set.
    ///
    /// Fails when the API key is missing or its environment variable is unset.
    pub fn gemini(config: &GeminiConfig) -> Result<AdapterSet, ConfigError> {
        let api_key = resolve_env_var(&config.api_key).ok_or_else(|| {
            ConfigError::ValidationError(
                "gemini.api_key is not set. Set GEMINI_API_KEY env var.".to_string(),
            )
        })?;
        let backend = Arc::new(super::gemini::GeminiBackend::new(config, &api_key));
        tracing::debug!(
            "Gemini adapters ready (image model {}, vision model {})",
            config.image_model,
            config.vision_model
        );
        Ok(AdapterSet::from_backend(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_input_from_file() {
        let file = ImageFile::new("a.jpg", "image/jpg", vec![0xFF, 0xD8, 0xFF]);
        let input = ImageInput::from_file(&file);
        assert_eq!(input.media_type, "image/jpeg");
        assert_eq!(input.data, "/9j/");
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_factory_requires_api_key() {
        let config = GeminiConfig {
            api_key: "${NOIR_TEST_UNSET_GEMINI_KEY}".to_string(),
            ..GeminiConfig::default()
        };
        let err = AdapterFactory::gemini(&config).err().unwrap();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_factory_with_literal_key() {
        let config = GeminiConfig {
            api_key: "literal-key".to_string(),
            ..GeminiConfig::default()
        };
        let adapters = AdapterFactory::gemini(&config).unwrap();
        assert_eq!(adapters.enhancer.name(), "gemini");
        assert_eq!(adapters.locator.name(), "gemini");
    }
}
