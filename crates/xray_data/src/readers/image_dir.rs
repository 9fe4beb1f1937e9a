use super::DataSource;
use crate::error::DataError;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Streams image file paths from one directory, sorted by file name.
///
/// Only paths are produced; bytes are read later by the loader. Symlinks,
/// subdirectories and files whose extension is not allow-listed are skipped.
/// The sort makes the listing independent of the filesystem's enumeration
/// order, which the resplit relies on for reproducibility.
///
/// # Example
/// ```ignore
/// let source = ImageDirSource::new("chest_xray/train/NORMAL", &["jpeg", "jpg", "png"], false);
/// for path in source.stream()? {
///     let path = path?;
/// }
/// ```
pub struct ImageDirSource {
    dir_path: PathBuf,
    extensions: Vec<String>,
    recurse: bool,
}

impl ImageDirSource {
    /// Creates a new image directory source.
    ///
    /// # Arguments
    /// - `dir_path`: Directory to scan.
    /// - `extensions`: File extensions to include (e.g., `["jpeg", "png"]`). Case-insensitive.
    /// - `recurse`: If `true`, scans subdirectories recursively.
    pub fn new<S: AsRef<str>>(dir_path: impl Into<PathBuf>, extensions: &[S], recurse: bool) -> Self {
        Self {
            dir_path: dir_path.into(),
            extensions: extensions
                .iter()
                .map(|s| s.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            recurse,
        }
    }

    fn extension_matches(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&e.to_lowercase()))
    }
}

/// Returns an iterator over matching image file paths.
impl DataSource<PathBuf> for ImageDirSource {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<PathBuf>> + Send>> {
        // Early validation: ensure the directory exists and is indeed a directory.
        let dir_metadata = fs::metadata(&self.dir_path).map_err(|e| {
            anyhow!(DataError::config(format!(
                "failed to access directory {}: {}",
                self.dir_path.display(),
                e
            )))
        })?;
        if !dir_metadata.is_dir() {
            return Err(anyhow!(DataError::config(format!(
                "path is not a directory: {}",
                self.dir_path.display()
            ))));
        }

        let walker = WalkDir::new(&self.dir_path)
            .min_depth(1)
            .max_depth(if self.recurse { usize::MAX } else { 1 })
            .follow_links(false)
            .sort_by_file_name();

        // Collect eagerly so the stream owns no borrow of `self`.
        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.with_context(|| {
                format!("Failed to read directory entry under {}", self.dir_path.display())
            });
            match entry {
                Ok(entry) => {
                    // `file_type` does not follow symlinks, so links are skipped here.
                    if entry.file_type().is_file() && self.extension_matches(entry.path()) {
                        paths.push(Ok(entry.into_path()));
                    }
                }
                Err(e) => paths.push(Err(e)),
            }
        }
        Ok(Box::new(paths.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_image_dir_stream_filters_and_sorts() -> Result<()> {
        let dir = tempdir()?;
        let d = dir.path();

        // Zero-byte files are fine: nothing is decoded at this stage.
        File::create(d.join("c.jpeg"))?;
        File::create(d.join("a.JPEG"))?;
        File::create(d.join("b.png"))?;
        File::create(d.join("notes.txt"))?;
        fs::create_dir(d.join("nested"))?;
        File::create(d.join("nested").join("d.jpeg"))?;

        let src = ImageDirSource::new(d, &["jpeg", "png"], false);
        let files: Vec<_> = src.stream()?.collect::<Result<Vec<_>>>()?;

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPEG", "b.png", "c.jpeg"]);

        let recursive = ImageDirSource::new(d, &["jpeg"], true);
        assert_eq!(recursive.stream()?.count(), 3);
        Ok(())
    }

    #[test]
    fn test_image_dir_missing_is_config_error() {
        let src = ImageDirSource::new("/definitely/not/here", &["jpeg"], false);
        let err = src.stream().err().expect("missing dir must fail");
        assert!(matches!(DataError::find(&err), Some(DataError::Config { .. })));
    }
}
