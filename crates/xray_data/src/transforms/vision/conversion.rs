use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::Array3;

// ============================================================================
// ToTensor
// ============================================================================

/// Converts an image to a channel-first `f32` tensor in [0.0, 1.0] range.
///
/// Channel Handling
/// | Input Format  | Output Shape |
/// |---------------|--------------|
/// | Grayscale (L) | `[1, H, W]`  |
/// | RGB           | `[3, H, W]`  |
/// | RGBA          | `[4, H, W]`  |
/// | Other         | `[3, H, W]`  |
/// Note: 16-bit and float images are converted to RGB8 first.
///
/// # Example
/// ```ignore
/// let tensor = ToTensor.apply(image)?;
/// ```
#[derive(Debug, Clone)]
pub struct ToTensor;

impl ToTensor {
    /// Reorders interleaved `HWC` bytes into a `CHW` tensor scaled to [0, 1].
    fn hwc_to_chw(raw: &[u8], channels: usize, height: usize, width: usize) -> Array3<f32> {
        Array3::from_shape_fn((channels, height, width), |(c, y, x)| {
            raw[(y * width + x) * channels + c] as f32 / 255.0
        })
    }
}

impl Transform<DynamicImage, Array3<f32>> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<Array3<f32>> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );
        let (h, w) = (height as usize, width as usize);

        Ok(match img {
            DynamicImage::ImageLuma8(img) => Self::hwc_to_chw(img.as_raw(), 1, h, w),
            DynamicImage::ImageRgb8(img) => Self::hwc_to_chw(img.as_raw(), 3, h, w),
            DynamicImage::ImageRgba8(img) => Self::hwc_to_chw(img.as_raw(), 4, h, w),
            // Handle all other cases via conversion to RGB
            other => Self::hwc_to_chw(other.to_rgb8().as_raw(), 3, h, w),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_to_tensor_layout_and_range() -> Result<()> {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([255, 0, 51]));

        let tensor = ToTensor.apply(DynamicImage::ImageRgb8(img))?;
        assert_eq!(tensor.dim(), (3, 2, 3)); // CHW format

        assert_eq!(tensor[[0, 1, 2]], 1.0);
        assert_eq!(tensor[[1, 1, 2]], 0.0);
        assert!((tensor[[2, 1, 2]] - 0.2).abs() < 1e-6);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
        Ok(())
    }
}
