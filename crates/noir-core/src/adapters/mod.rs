//! External-service adapters: face location, enhancement, and refinement.
//!
//! The pipeline only sees the traits; `GeminiBackend` is the one shipped
//! implementation and serves all three roles.

pub(crate) mod gemini;
pub mod prompt;
pub(crate) mod provider;

pub use gemini::GeminiBackend;
pub use provider::{
    resolve_env_var, AdapterFactory, AdapterSet, Enhancer, FaceLocator, ImageInput,
    RefineOptions, RefineRequest, Refiner,
};
