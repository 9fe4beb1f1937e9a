use ndarray::Array3;
use std::path::PathBuf;

/// The `Sample` struct represents one decoded record, ready for batching.
///
/// - `image`: channel-first `[C, H, W]` `f32` tensor after the full transform
///   pipeline (decode, resize, crop, normalize).
/// - `label`: dense class index from the `ClassIndex`.
/// - `path`: source file, carried along so a batch can name its records.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: Array3<f32>,
    pub label: usize,
    pub path: PathBuf,
}

impl Sample {
    pub fn new(image: Array3<f32>, label: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            image,
            label,
            path: path.into(),
        }
    }

    /// `(channels, height, width)` of the image tensor.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.image.dim()
    }
}
