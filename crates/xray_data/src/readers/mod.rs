pub mod image_dir;

pub use image_dir::ImageDirSource;

use anyhow::Result;

/// A `DataSource` lazily yields raw items (here, file paths) for indexing.
///
/// Sources are re-streamable: every call to `stream` starts from the
/// beginning, which keeps indexing a pure function of the filesystem state.
pub trait DataSource<T>: Send + Sync {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<T>> + Send>>;
}
