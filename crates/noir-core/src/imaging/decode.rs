//! Decode and re-encode helpers shared by the preprocessor and the cropper.
//!
//! Everything here is synchronous and CPU-bound; callers run it through
//! [`run_blocking`] so the async runtime is never stalled by a large decode.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

/// Result of decoding an image.
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

/// Decode an in-memory image, detecting the format from its content.
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedImage, String> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("Cannot detect image format: {e}"))?;
    let format = reader
        .format()
        .ok_or_else(|| "Unrecognized image format".to_string())?;
    let image = reader.decode().map_err(|e| e.to_string())?;

    let (width, height) = image.dimensions();
    Ok(DecodedImage {
        image,
        format,
        width,
        height,
    })
}

/// Encode as baseline JPEG. Alpha is dropped; JPEG has no alpha channel.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, String> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| format!("JPEG encode failed: {e}"))?;
    Ok(buffer)
}

/// Run a CPU-bound closure on the blocking pool.
pub async fn run_blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(format!("Task join error: {e}")),
    }
}

/// Replace the extension of a file name with `.jpg`.
pub fn jpeg_name(name: &str) -> String {
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    };
    format!("{stem}.jpg")
}
