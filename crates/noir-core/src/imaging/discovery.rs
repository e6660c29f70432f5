//! Input discovery: expand files and directories into a list of images.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions accepted as portrait inputs (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 8] =
    ["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

/// A discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Expands command-line inputs into image files.
#[derive(Debug)]
pub struct FileDiscovery {
    follow_links: bool,
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self { follow_links: true }
    }

    /// Discover images under every input path.
    ///
    /// Explicit file arguments are kept in the order given, even with an
    /// unsupported extension (the preprocessor rejects non-images). Directory
    /// contents are walked recursively and sorted by path. A file reachable
    /// from more than one input appears once, at its first position.
    pub fn discover_all(&self, inputs: &[PathBuf]) -> Vec<DiscoveredFile> {
        let mut seen = BTreeSet::new();
        let mut files = Vec::new();

        for input in inputs {
            for file in self.discover(input) {
                if seen.insert(file.path.clone()) {
                    files.push(file);
                }
            }
        }
        files
    }

    /// Discover images at a single path.
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            return match std::fs::metadata(path) {
                Ok(meta) => vec![DiscoveredFile {
                    path: path.to_path_buf(),
                    size: meta.len(),
                }],
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {}", path, e);
                    vec![]
                }
            };
        }

        let mut files: Vec<DiscoveredFile> = WalkDir::new(path)
            .follow_links(self.follow_links)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Walk error under {:?}: {}", path, e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
            .filter_map(|entry| {
                let size = entry.metadata().ok()?.len();
                Some(DiscoveredFile {
                    path: entry.into_path(),
                    size,
                })
            })
            .collect();

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Get total size of all discovered files.
    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}

/// Check if a path has a supported image extension.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("test.jpg")));
        assert!(is_supported(Path::new("test.JPG")));
        assert!(is_supported(Path::new("test.jpeg")));
        assert!(is_supported(Path::new("test.png")));
        assert!(is_supported(Path::new("test.webp")));
        assert!(!is_supported(Path::new("test.txt")));
        assert!(!is_supported(Path::new("test")));
    }

    #[test]
    fn test_discover_directory_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.png"), b"x").unwrap();
        fs::write(dir.path().join("a.jpg"), b"xy").unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.webp"), b"xyz").unwrap();

        let files = FileDiscovery::new().discover(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.jpg"),
                PathBuf::from("b.png"),
                PathBuf::from("nested").join("c.webp"),
            ]
        );
        assert_eq!(FileDiscovery::total_size(&files), 6);
    }

    #[test]
    fn test_discover_all_keeps_argument_order_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let z = dir.path().join("z.jpg");
        let a = dir.path().join("a.jpg");
        fs::write(&z, b"z").unwrap();
        fs::write(&a, b"a").unwrap();

        let inputs = vec![z.clone(), dir.path().to_path_buf()];
        let files = FileDiscovery::new().discover_all(&inputs);
        let paths: Vec<_> = files.into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec![z, a]);
    }

    #[test]
    fn test_discover_explicit_file_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join("portrait.heic");
        fs::write(&odd, b"data").unwrap();

        let files = FileDiscovery::new().discover(&odd);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 4);
    }

    #[test]
    fn test_discover_missing_path_is_empty() {
        let files = FileDiscovery::new().discover(Path::new("/definitely/not/here"));
        assert!(files.is_empty());
    }
}
