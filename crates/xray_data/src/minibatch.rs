use ndarray::Array4;
use std::path::PathBuf;

/// The `MiniBatch` struct represents a batch of decoded records grouped for
/// model input.
///
/// It is built by a [`Collator`](crate::collator::Collator), which stacks
/// [`Sample`](crate::sample::Sample)s along the batch dimension (axis 0).
/// The three fields are aligned by position:
/// - `images`: `[B, C, H, W]`
/// - `labels`: `B` dense class indices
/// - `paths`: `B` source files
///
/// # Examples
/// Four samples of shape `[3, 224, 224]` produce `images` of shape
/// `[4, 3, 224, 224]` and `labels.len() == 4`.
#[derive(Debug, Clone, PartialEq)]
pub struct MiniBatch {
    pub images: Array4<f32>,
    pub labels: Vec<usize>,
    pub paths: Vec<PathBuf>,
}

impl MiniBatch {
    /// Returns the number of samples in the batch.
    pub fn batch_size(&self) -> usize {
        self.labels.len()
    }
}
