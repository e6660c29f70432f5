//! Core data types shared by the pipeline, the adapters, and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};

/// Opaque job identifier.
///
/// Allocated from a per-pipeline counter and never reused, so ordering ids
/// orders jobs by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// An encoded image plus the metadata needed to send it anywhere.
///
/// Cloning is cheap: the bytes are shared, never copied.
#[derive(Debug, Clone)]
pub struct ImageFile {
    name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl ImageFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Build a file whose MIME type is sniffed from its content.
    ///
    /// Falls back to `application/octet-stream` when the content is not a
    /// recognized image; the preprocessor rejects such files later.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Self::new(name, mime_type, bytes)
    }

    /// Read a file from disk.
    pub async fn read(path: &Path) -> PipelineResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::UnreadableImage {
                name: name.clone(),
                message: format!("Cannot read file: {e}"),
            })?;
        Ok(Self::from_bytes(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(0) | None => &self.name,
            Some(idx) => &self.name[..idx],
        }
    }

    /// Extension matching the MIME type ("jpg", "png", ...).
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    /// True when both handles point at the same underlying bytes.
    pub fn same_bytes(&self, other: &ImageFile) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

/// Map a MIME type to the file extension used when writing results.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "png",
    }
}

/// Normalized, axis-aligned bounding box of a face.
///
/// All four values are fractions of the image dimensions in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Slack allowed for boxes that poke slightly past the image edge.
const REGION_TOLERANCE: f32 = 0.01;

impl FaceRegion {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check the region is finite, non-empty, and inside the unit square.
    pub fn validate(&self) -> Result<(), String> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(format!("non-finite face region {self:?}"));
        }
        if values.iter().any(|v| *v < 0.0 || *v > 1.0) {
            return Err(format!("face region outside [0, 1]: {self:?}"));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(format!("empty face region {self:?}"));
        }
        if self.x + self.width > 1.0 + REGION_TOLERANCE
            || self.y + self.height > 1.0 + REGION_TOLERANCE
        {
            return Err(format!("face region extends past the image: {self:?}"));
        }
        Ok(())
    }

    /// Center of the box in normalized coordinates.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Normalized area, used to rank faces.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for the face locator
    Detecting,
    /// Several faces found; the user must pick one
    SelectionNeeded,
    /// Has a process input and can be enhanced
    Ready,
    /// Enhancement request in flight
    Processing,
    /// Enhanced result available
    Done,
    /// Last operation on the job failed
    Error,
}

impl JobState {
    /// States that block batch generation from starting.
    pub fn is_pending(self) -> bool {
        matches!(self, JobState::Detecting | JobState::SelectionNeeded)
    }

    /// States eligible for the next batch run.
    pub fn is_batch_eligible(self) -> bool {
        matches!(self, JobState::Ready | JobState::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Detecting => "detecting",
            JobState::SelectionNeeded => "selection_needed",
            JobState::Ready => "ready",
            JobState::Processing => "processing",
            JobState::Done => "done",
            JobState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Which of a job's files the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySource {
    Original,
    Crop,
}
