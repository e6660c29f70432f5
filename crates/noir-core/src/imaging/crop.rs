//! Face-centered cropping.
//!
//! The window is sized from the face height, centered on the face, shrunk to
//! fit when the ideal window is larger than the image, and clamped so it
//! never reads outside the source.

use super::decode::{decode_bytes, encode_jpeg, run_blocking};
use crate::config::CropConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{FaceRegion, ImageFile};

/// A pixel rectangle inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the crop window for `face` in an `image_width` x `image_height` image.
///
/// `aspect_ratio` is width / height of the window; `padding` multiplies the
/// face height. Returns `None` for an empty image or a non-positive aspect
/// ratio.
pub fn crop_window(
    image_width: u32,
    image_height: u32,
    face: &FaceRegion,
    aspect_ratio: f32,
    padding: f32,
) -> Option<CropWindow> {
    if image_width == 0 || image_height == 0 || !(aspect_ratio > 0.0) {
        return None;
    }
    let iw = image_width as f64;
    let ih = image_height as f64;
    let aspect = aspect_ratio as f64;

    let mut crop_h = face.height as f64 * ih * padding as f64;
    let mut crop_w = crop_h * aspect;
    if crop_w > iw {
        crop_w = iw;
        crop_h = crop_w / aspect;
    }
    if crop_h > ih {
        crop_h = ih;
        crop_w = crop_h * aspect;
    }

    let width = (crop_w.round() as u32).clamp(1, image_width);
    let height = (crop_h.round() as u32).clamp(1, image_height);

    let (cx, cy) = face.center();
    let ideal_x = cx as f64 * iw - width as f64 / 2.0;
    let ideal_y = cy as f64 * ih - height as f64 / 2.0;
    let x = ideal_x.round().clamp(0.0, (image_width - width) as f64) as u32;
    let y = ideal_y.round().clamp(0.0, (image_height - height) as f64) as u32;

    Some(CropWindow {
        x,
        y,
        width,
        height,
    })
}

/// Derives cropped files from originals.
pub struct Cropper {
    config: CropConfig,
    jpeg_quality: u8,
}

impl Cropper {
    pub fn new(config: CropConfig, jpeg_quality: u8) -> Self {
        Self {
            config,
            jpeg_quality,
        }
    }

    /// Crop `source` around `face`, producing a new JPEG file.
    pub async fn crop(&self, source: &ImageFile, face: &FaceRegion) -> PipelineResult<ImageFile> {
        let crop_failed = |message: String| PipelineError::CropFailed {
            name: source.name().to_string(),
            message,
        };
        face.validate().map_err(crop_failed)?;

        let file = source.clone();
        let face = *face;
        let aspect_ratio = self.config.aspect_ratio;
        let padding = self.config.padding;
        let quality = self.jpeg_quality;

        let (bytes, window) = run_blocking(move || {
            let decoded = decode_bytes(file.bytes())?;
            let window = crop_window(decoded.width, decoded.height, &face, aspect_ratio, padding)
                .ok_or_else(|| "degenerate crop window".to_string())?;
            let cropped = decoded
                .image
                .crop_imm(window.x, window.y, window.width, window.height);
            let bytes = encode_jpeg(&cropped, quality)?;
            Ok((bytes, window))
        })
        .await
        .map_err(crop_failed)?;

        tracing::debug!(
            "Cropped {} to {}x{} at ({}, {})",
            source.name(),
            window.width,
            window.height,
            window.x,
            window.y
        );

        Ok(ImageFile::new(
            format!("{}-crop.jpg", source.stem()),
            "image/jpeg",
            bytes,
        ))
    }
}
