use crate::transforms::Transform;
use anyhow::{ensure, Result};
use ndarray::{Array3, Axis};

// ============================================================================
// Normalize
// ============================================================================

/// Normalizes tensors using channel-wise statistics.
///
/// # Arguments:
/// - `mean`: per-channel means
/// - `std`: per-channel standard deviation (all strictly positive).
/// The dimensions of mean and std should match the input tensor's
/// number of channels.
///
/// # Mathematical Operation:
/// ```text
/// output[c,h,w] = (input[c,h,w] - mean[c]) / std[c]
/// ```
///
/// # Example
/// ```ignore
/// let norm = Normalize::imagenet();
/// let normalized = norm.apply(tensor)?;
/// ```
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    /// Creates new normalization parameters.
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self> {
        ensure!(!mean.is_empty(), "Normalization mean cannot be empty");
        ensure!(
            mean.len() == std.len(),
            "The mean and standard deviation for normalization must match in dimension. \
            The dimension of mean is {} but the dimension of std is {}.",
            mean.len(),
            std.len()
        );
        ensure!(
            std.iter().all(|&s| s > 0.0 && s.is_finite()),
            "Normalization std must be finite and positive (got {:?})",
            std
        );
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    /// ImageNet standard normalization (RGB), the statistics the pretrained
    /// backbone was trained with.
    pub fn imagenet() -> Self {
        Self {
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
        }
    }
}

impl Transform<Array3<f32>, Array3<f32>> for Normalize {
    fn apply(&self, mut tensor: Array3<f32>) -> Result<Array3<f32>> {
        let num_channels = tensor.len_of(Axis(0));
        ensure!(
            num_channels == self.mean.len(),
            "Channel count mismatch: input has {} channels but normalization expects {}",
            num_channels,
            self.mean.len()
        );

        for (c, mut channel) in tensor.axis_iter_mut(Axis(0)).enumerate() {
            let (mean, std) = (self.mean[c], self.std[c]);
            channel.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() -> Result<()> {
        let tensor = Array3::<f32>::ones((3, 8, 8));
        let norm = Normalize::new(&[1.0, 0.5, 0.0], &[1.0, 0.5, 2.0])?;

        let normalized = norm.apply(tensor)?;

        assert!(normalized.index_axis(Axis(0), 0).iter().all(|&v| v.abs() < 1e-6));
        assert!(normalized.index_axis(Axis(0), 1).iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(normalized.index_axis(Axis(0), 2).iter().all(|&v| (v - 0.5).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn test_normalize_channel_mismatch() -> Result<()> {
        let gray = Array3::<f32>::zeros((1, 4, 4));
        assert!(Normalize::imagenet().apply(gray).is_err());
        Ok(())
    }

    #[test]
    fn test_normalize_rejects_zero_std() {
        assert!(Normalize::new(&[0.5], &[0.0]).is_err());
        assert!(Normalize::new(&[0.5, 0.5], &[1.0]).is_err());
    }
}
