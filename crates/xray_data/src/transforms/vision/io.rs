use crate::sample::Sample;
use crate::transforms::Transform;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::PathBuf;

// ============================================================================
// LoadImage - Base image loader
// ============================================================================

/// Loads images from file paths.
///
/// Reads the whole file through a buffered reader, then lets the `image`
/// crate sniff the format from the content. The extension is not trusted,
/// so a PNG saved as `.jpeg` still decodes and a text file named `.jpeg`
/// fails with a decode error.
///
/// # Input/Output
/// - **Input**: `PathBuf` - File path to image
/// - **Output**: `DynamicImage` - Loaded image ready for processing
#[derive(Debug, Clone)]
pub struct LoadImage {
    buffer_size: usize,
}

impl Default for LoadImage {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadImage {
    /// Creates a new image loader with an 8KB read buffer.
    pub fn new() -> Self {
        Self { buffer_size: 8192 }
    }
}

impl Transform<PathBuf, DynamicImage> for LoadImage {
    fn apply(&self, path: PathBuf) -> Result<DynamicImage> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;

        let file_size = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = Vec::with_capacity(file_size);
        reader
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;

        ImageReader::new(Cursor::new(buffer))
            .with_guessed_format()
            .with_context(|| format!("Failed to detect image format: {}", path.display()))?
            .decode()
            .with_context(|| format!("Failed to decode image: {}", path.display()))
    }
}

// ============================================================================
// LoadImageToSample
// ============================================================================

/// Loads an image from a `(path, label_index)` pair and converts it into a
/// [`Sample`].
///
/// 1. Loads the file with [`LoadImage`]
/// 2. Applies the image pipeline `T` (`DynamicImage` -> `[C, H, W]` tensor)
/// 3. Wraps the tensor with its label and source path
///
/// # Example
/// ```ignore
/// let pipeline = XrayTransform::new(&TransformConfig::default(), false)?;
/// let loader = LoadImageToSample::new(pipeline);
/// let sample = loader.apply((PathBuf::from("test/NORMAL/a.jpeg"), 0))?;
/// ```
#[derive(Debug, Clone)]
pub struct LoadImageToSample<T> {
    image_loader: LoadImage,
    image_transform: T,
}

impl<T> LoadImageToSample<T> {
    pub fn new(image_transform: T) -> Self {
        Self {
            image_loader: LoadImage::new(),
            image_transform,
        }
    }
}

impl<T> Transform<(PathBuf, usize), Sample> for LoadImageToSample<T>
where
    T: Transform<DynamicImage, Array3<f32>>,
{
    fn apply(&self, (path, label): (PathBuf, usize)) -> Result<Sample> {
        let image = self.image_loader.apply(path.clone())?;

        let image_tensor = self
            .image_transform
            .apply(image)
            .with_context(|| format!("Failed to apply transforms to image: {}", path.display()))?;

        Ok(Sample::new(image_tensor, label, path))
    }
}

// ============================================================================
// Tests
// ============================================================================
