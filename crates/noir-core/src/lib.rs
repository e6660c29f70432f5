//! Noir Core - batch portrait enhancement pipeline.
//!
//! Noir turns ordinary portraits into black-and-white studio images by
//! sending each one, with a style-driven instruction, to a generative image
//! model. The library owns the per-job orchestration around those calls:
//!
//! ```text
//! Files → Preprocess → Locate faces → (select) → Crop → Enhance → (Refine)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use noir_core::{AdapterFactory, Config, ImageFile, JobPipeline, StyleConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let adapters = AdapterFactory::gemini(&config.gemini)?;
//!     let pipeline = JobPipeline::new(&config, adapters);
//!
//!     let file = ImageFile::read("portrait.jpg".as_ref()).await?;
//!     pipeline.ingest(vec![file]).await?;
//!     pipeline.settle().await;
//!
//!     let summary = pipeline.run_batch(&StyleConfig::default(), |_| {}).await?;
//!     println!("{} enhanced", summary.succeeded);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod style;
pub mod types;

pub use adapters::{AdapterFactory, AdapterSet, Enhancer, FaceLocator, RefineOptions, Refiner};
pub use config::Config;
pub use error::{ConfigError, PipelineError, PipelineResult};
pub use output::{ReportEntry, ReportFormat, ReportWriter};
pub use pipeline::{
    BatchEvent, BatchSummary, ImageJob, JobOutcome, JobPipeline, JobSnapshot, PipelineStatus,
};
pub use style::{Backdrop, MasterStyle, StyleConfig};
pub use types::{DisplaySource, FaceRegion, ImageFile, JobId, JobState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
