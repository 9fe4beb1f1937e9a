use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};

// ============================================================================
// EnsureRGB
// ============================================================================
/// Ensures that the image is 3-channel RGB.
///
/// Chest X-rays are mostly stored as single-channel grayscale JPEGs; the
/// pretrained backbone expects three channels, so luma is replicated.
#[derive(Debug, Clone)]
pub struct EnsureRGB;

impl Transform<DynamicImage, DynamicImage> for EnsureRGB {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        Ok(match img {
            DynamicImage::ImageRgb8(_) => img,
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        })
    }
}

// ============================================================================
// Resize
// ============================================================================

/// Resizes an image to exactly `width × height`, ignoring the aspect ratio.
/// Users must specify the filter type.
///
/// # Filter Types
/// - `Nearest`: Nearest neighbour, fastest
/// - `Triangle`: Bilinear filter, good all-round default
/// - `CatmullRom`: Bicubic sharpening
/// - `Gaussian`: Blurring/smoothing
/// - `Lanczos3`: Lanczos with window 3, highest quality re-sampling but slowest.
///
/// # Examples
/// ``` ignore
/// # use image::imageops::FilterType;
/// let resize = Resize::new(256, 256, FilterType::Triangle)?;
/// let resized = resize.apply(img)?;
/// ```
#[derive(Debug, Clone)]
pub struct Resize {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl Resize {
    /// Creates a new Resize transform.
    pub fn new(width: u32, height: u32, filter: FilterType) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive after resizing (got {}x{})",
            width,
            height
        );
        Ok(Self {
            width,
            height,
            filter,
        })
    }
}

impl Transform<DynamicImage, DynamicImage> for Resize {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if img.dimensions() == (self.width, self.height) {
            return Ok(img);
        }
        Ok(img.resize_exact(self.width, self.height, self.filter))
    }
}

// ============================================================================
// CenterCrop
// ============================================================================

/// Crops the central `width × height` window. The input must be at least as
/// large as the crop in both dimensions.
#[derive(Debug, Clone)]
pub struct CenterCrop {
    width: u32,
    height: u32,
}

impl CenterCrop {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "Crop dimensions must be positive (got {}x{})",
            width,
            height
        );
        Ok(Self { width, height })
    }
}

impl Transform<DynamicImage, DynamicImage> for CenterCrop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        ensure!(
            width >= self.width && height >= self.height,
            "Cannot center-crop {}x{} out of a {}x{} image",
            self.width,
            self.height,
            width,
            height
        );
        if (width, height) == (self.width, self.height) {
            return Ok(img);
        }
        let x = (width - self.width) / 2;
        let y = (height - self.height) / 2;
        Ok(img.crop_imm(x, y, self.width, self.height))
    }
}
