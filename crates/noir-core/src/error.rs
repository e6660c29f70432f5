//! Error types for the noir enhancement pipeline.
//!
//! Errors are organized by stage so that a failure captured on a job can be
//! rendered as-is next to that job, and batch-level failures carry enough
//! context (file name, stage, limit) to be acted on.

use thiserror::Error;

use crate::types::JobId;

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input could not be read or decoded as an image
    #[error("Unreadable image {name}: {message}")]
    UnreadableImage { name: String, message: String },

    /// Face locator call errored or returned malformed data
    #[error("Face detection failed: {message}")]
    DetectionFailed { message: String },

    /// Cropping around a face region failed
    #[error("Crop failed for {name}: {message}")]
    CropFailed { name: String, message: String },

    /// Remote model refused the request on policy grounds
    #[error("Enhancement blocked by content policy: {reason}")]
    EnhancementBlocked { reason: String },

    /// Remote call succeeded but produced no image
    #[error("No image was generated by the model")]
    EnhancementEmpty,

    /// Network or HTTP failure talking to the remote model
    #[error("Enhancement request failed: {message}")]
    EnhancementTransport {
        message: String,
        status_code: Option<u16>,
    },

    /// Refinement of a finished job failed; the job is left untouched
    #[error("Refinement failed: {source}")]
    RefinementFailed {
        #[source]
        source: Box<PipelineError>,
    },

    /// Operation rejected because the pipeline is not in a state that allows it
    #[error("{0}")]
    Validation(String),

    /// Adapter call exceeded its configured limit
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// Adapter call abandoned because the batch was reset
    #[error("Operation cancelled")]
    Cancelled,

    /// No job with this id exists (never created, or discarded by a reset)
    #[error("Job not found: {0}")]
    JobNotFound(JobId),
}

impl PipelineError {
    /// Wrap an adapter failure raised while refining.
    pub fn refinement(source: PipelineError) -> Self {
        match source {
            already @ PipelineError::RefinementFailed { .. } => already,
            other => PipelineError::RefinementFailed {
                source: Box::new(other),
            },
        }
    }
}

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
