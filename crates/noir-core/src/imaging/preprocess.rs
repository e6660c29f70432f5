//! Input normalization: bound the longest edge and re-encode as JPEG.

use image::imageops::FilterType;

use super::decode::{decode_bytes, encode_jpeg, jpeg_name, run_blocking};
use super::validate::Validator;
use crate::config::PreprocessConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::ImageFile;

/// Resizes incoming images before any network use.
pub struct Preprocessor {
    config: PreprocessConfig,
    validator: Validator,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig, max_file_size_mb: u64) -> Self {
        Self {
            config,
            validator: Validator::new(max_file_size_mb),
        }
    }

    /// Output dimensions for an image of `width` x `height`.
    ///
    /// The longer edge becomes exactly `max_dimension` when it exceeds it;
    /// the shorter edge is scaled proportionally and rounded (minimum 1px).
    /// Images already within bounds keep their dimensions.
    pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
        if width <= max_dimension && height <= max_dimension {
            return (width, height);
        }
        let max = max_dimension as f64;
        if width > height {
            let h = (height as f64 * max / width as f64).round() as u32;
            (max_dimension, h.max(1))
        } else {
            let w = (width as f64 * max / height as f64).round() as u32;
            (w.max(1), max_dimension)
        }
    }

    /// Produce a new, bounded JPEG file. The input is left untouched.
    pub async fn preprocess(&self, file: &ImageFile) -> PipelineResult<ImageFile> {
        self.validator.validate(file)?;

        let source = file.clone();
        let max_dimension = self.config.max_dimension;
        let quality = self.config.jpeg_quality;

        let (bytes, from, to) = run_blocking(move || {
            let decoded = decode_bytes(source.bytes())?;
            let (w, h) = Self::target_dimensions(decoded.width, decoded.height, max_dimension);
            let image = if (w, h) == (decoded.width, decoded.height) {
                decoded.image
            } else {
                decoded.image.resize_exact(w, h, FilterType::Lanczos3)
            };
            let bytes = encode_jpeg(&image, quality)?;
            Ok((bytes, (decoded.width, decoded.height), (w, h)))
        })
        .await
        .map_err(|message| PipelineError::UnreadableImage {
            name: file.name().to_string(),
            message,
        })?;

        tracing::debug!(
            "Preprocessed {} {}x{} -> {}x{} ({} bytes)",
            file.name(),
            from.0,
            from.1,
            to.0,
            to.1,
            bytes.len()
        );

        Ok(ImageFile::new(jpeg_name(file.name()), "image/jpeg", bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::decode::decode_bytes;
    use crate::imaging::test_support::{png_bytes, png_file};

    fn preprocessor(max_dimension: u32) -> Preprocessor {
        Preprocessor::new(
            PreprocessConfig {
                max_dimension,
                jpeg_quality: 90,
            },
            10,
        )
    }

    #[test]
    fn test_target_dimensions_within_bounds_unchanged() {
        assert_eq!(Preprocessor::target_dimensions(800, 600, 1024), (800, 600));
        assert_eq!(Preprocessor::target_dimensions(1024, 1024, 1024), (1024, 1024));
    }

    #[test]
    fn test_target_dimensions_longest_edge_equals_max() {
        assert_eq!(Preprocessor::target_dimensions(4000, 3000, 2048), (2048, 1536));
        assert_eq!(Preprocessor::target_dimensions(3000, 4000, 2048), (1536, 2048));
        assert_eq!(Preprocessor::target_dimensions(3000, 3000, 2048), (2048, 2048));
    }

    #[test]
    fn test_target_dimensions_aspect_within_rounding() {
        let max = 1000u32;
        for (w, h) in [(4032, 3024), (1001, 7), (5000, 1234), (1234, 5000), (2999, 3001)] {
            let (tw, th) = Preprocessor::target_dimensions(w, h, max);
            assert_eq!(tw.max(th), max, "{w}x{h}");
            let (long, short, t_short) = if w > h { (w, h, th) } else { (h, w, tw) };
            let ideal = short as f64 * max as f64 / long as f64;
            assert!(
                (t_short as f64 - ideal).abs() <= 1.0,
                "{w}x{h} -> {tw}x{th}, ideal short edge {ideal}"
            );
        }
    }

    #[test]
    fn test_target_dimensions_never_zero() {
        assert_eq!(Preprocessor::target_dimensions(10_000, 1, 100), (100, 1));
    }

    #[tokio::test]
    async fn test_preprocess_downscales_and_reencodes() {
        let input = png_file("wide.png", 200, 100);
        let output = preprocessor(64).preprocess(&input).await.unwrap();

        assert_eq!(output.name(), "wide.jpg");
        assert_eq!(output.mime_type(), "image/jpeg");
        let decoded = decode_bytes(output.bytes()).unwrap();
        assert_eq!((decoded.width, decoded.height), (64, 32));
    }

    #[tokio::test]
    async fn test_preprocess_small_image_keeps_dimensions() {
        let input = png_file("small.png", 40, 30);
        let output = preprocessor(64).preprocess(&input).await.unwrap();

        assert!(!output.same_bytes(&input));
        assert_eq!(output.mime_type(), "image/jpeg");
        let decoded = decode_bytes(output.bytes()).unwrap();
        assert_eq!((decoded.width, decoded.height), (40, 30));
    }

    #[tokio::test]
    async fn test_preprocess_rejects_unreadable() {
        let input = ImageFile::new("fake.jpg", "image/jpeg", b"not an image at all".to_vec());
        let err = preprocessor(64).preprocess(&input).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnreadableImage { .. }));
    }

    #[tokio::test]
    async fn test_preprocess_rejects_truncated_png() {
        let mut bytes = png_bytes(50, 50);
        bytes.truncate(20);
        let input = ImageFile::new("cut.png", "image/png", bytes);
        let err = preprocessor(64).preprocess(&input).await.unwrap_err();
        match err {
            PipelineError::UnreadableImage { name, .. } => assert_eq!(name, "cut.png"),
            other => panic!("Expected UnreadableImage, got {other:?}"),
        }
    }
}
