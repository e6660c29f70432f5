//! Input validation before decode.

use crate::error::PipelineError;
use crate::types::ImageFile;

/// Rejects inputs that are obviously not images before spending a decode on them.
pub struct Validator {
    max_file_size_mb: u64,
}

impl Validator {
    pub fn new(max_file_size_mb: u64) -> Self {
        Self { max_file_size_mb }
    }

    /// Quick checks:
    /// - file is non-empty and within the size limit
    /// - file starts with a known image signature
    pub fn validate(&self, file: &ImageFile) -> Result<(), PipelineError> {
        let unreadable = |message: String| PipelineError::UnreadableImage {
            name: file.name().to_string(),
            message,
        };

        if file.len() < 4 {
            return Err(unreadable("File too small to be a valid image".to_string()));
        }

        let max_bytes = self.max_file_size_mb * 1024 * 1024;
        if file.len() as u64 > max_bytes {
            return Err(unreadable(format!(
                "File too large ({}MB > {}MB)",
                file.len() as u64 / (1024 * 1024),
                self.max_file_size_mb
            )));
        }

        if !is_image_header(file.bytes()) {
            return Err(unreadable(
                "Unrecognized image format (invalid magic bytes)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Check whether the leading bytes match a supported image format.
fn is_image_header(bytes: &[u8]) -> bool {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => true,
        [0x89, b'P', b'N', b'G', ..] => true,
        [b'G', b'I', b'F', b'8', ..] => true,
        [b'R', b'I', b'F', b'F', _, _, _, _, rest @ ..] => {
            // Truncated RIFF header: let the decoder decide
            rest.len() < 4 || rest.starts_with(b"WEBP")
        }
        [b'B', b'M', ..] => true,
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(bytes: &[u8]) -> ImageFile {
        ImageFile::new("test.bin", "application/octet-stream", bytes.to_vec())
    }

    #[test]
    fn test_magic_bytes_jpeg() {
        assert!(is_image_header(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]));
    }

    #[test]
    fn test_magic_bytes_png() {
        assert!(is_image_header(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]));
    }

    #[test]
    fn test_magic_bytes_webp() {
        let header = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'E', b'B', b'P'];
        assert!(is_image_header(&header));
    }

    #[test]
    fn test_magic_bytes_riff_wave_rejected() {
        let header = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'A', b'V', b'E'];
        assert!(!is_image_header(&header));
    }

    #[test]
    fn test_magic_bytes_tiff() {
        assert!(is_image_header(&[b'I', b'I', 0x2A, 0x00]));
        assert!(is_image_header(&[b'M', b'M', 0x00, 0x2A]));
        assert!(!is_image_header(&[b'I', b'I', 0x00, 0x00]));
    }

    #[test]
    fn test_validate_rejects_small_file() {
        let err = Validator::new(10).validate(&file(&[0xFF, 0xD8])).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn test_validate_rejects_oversized_file() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.resize(2 * 1024 * 1024, 0);
        let err = Validator::new(1).validate(&file(&bytes)).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_validate_rejects_text() {
        let err = Validator::new(10)
            .validate(&file(b"hello world"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnreadableImage { .. }));
    }
}
