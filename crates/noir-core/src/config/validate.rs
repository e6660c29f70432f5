//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.preprocess.max_dimension == 0 {
            return Err(invalid("preprocess.max_dimension must be > 0"));
        }
        if !(1..=100).contains(&self.preprocess.jpeg_quality) {
            return Err(invalid("preprocess.jpeg_quality must be between 1 and 100"));
        }
        if !self.crop.padding.is_finite() || self.crop.padding < 1.0 {
            return Err(invalid("crop.padding must be >= 1.0"));
        }
        if !self.crop.aspect_ratio.is_finite() || self.crop.aspect_ratio <= 0.0 {
            return Err(invalid("crop.aspect_ratio must be > 0"));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(invalid("limits.max_file_size_mb must be > 0"));
        }
        if self.limits.detect_timeout_ms == 0 {
            return Err(invalid("limits.detect_timeout_ms must be > 0"));
        }
        if self.limits.enhance_timeout_ms == 0 {
            return Err(invalid("limits.enhance_timeout_ms must be > 0"));
        }
        if self.limits.refine_timeout_ms == 0 {
            return Err(invalid("limits.refine_timeout_ms must be > 0"));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(invalid("logging.format must be \"pretty\" or \"json\""));
        }
        Ok(())
    }
}
