use super::{CenterCrop, EnsureRGB, Normalize, RandomHorizontalFlip, Resize, ToTensor};
use crate::transforms::{Chain, Transform};
use anyhow::{ensure, Result};
use image::{imageops::FilterType, DynamicImage};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Parameters of the image preprocessing shared by every split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Side of the square the decoded image is resized to.
    pub resize: u32,
    /// Side of the centered square cropped out of the resized image.
    pub crop: u32,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    /// Probability of a horizontal flip on training images. Zero disables
    /// augmentation entirely.
    pub flip_probability: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            resize: 256,
            crop: 224,
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
            flip_probability: 0.0,
        }
    }
}

/// The full `DynamicImage -> [3, crop, crop]` pipeline:
///
/// ```text
/// EnsureRGB → Resize(resize²) → CenterCrop(crop²) → [RandomHorizontalFlip] → ToTensor → Normalize
/// ```
///
/// Every step except the optional flip is deterministic, so val/test
/// batches are bit-identical across passes.
#[derive(Debug, Clone)]
pub struct XrayTransform {
    steps: Steps,
    augment: bool,
}

/// The statically dispatched chain built by [`XrayTransform::new`].
type Steps = Chain<
    Chain<
        Chain<
            Chain<Chain<EnsureRGB, Resize, DynamicImage>, CenterCrop, DynamicImage>,
            Option<RandomHorizontalFlip>,
            DynamicImage,
        >,
        ToTensor,
        DynamicImage,
    >,
    Normalize,
    Array3<f32>,
>;

impl XrayTransform {
    /// Builds the pipeline. `augment` enables the flip (training split only).
    pub fn new(config: &TransformConfig, augment: bool) -> Result<Self> {
        ensure!(
            config.crop <= config.resize,
            "Crop size {} must not exceed resize size {}",
            config.crop,
            config.resize
        );
        ensure!(
            config.mean.len() == 3,
            "Expected 3 normalization channels for RGB input, got {}",
            config.mean.len()
        );

        let flip = if augment && config.flip_probability > 0.0 {
            Some(RandomHorizontalFlip::new(config.flip_probability)?)
        } else {
            None
        };

        let augment = flip.is_some();
        let steps = EnsureRGB
            .then(Resize::new(config.resize, config.resize, FilterType::Triangle)?)
            .then(CenterCrop::new(config.crop, config.crop)?)
            .then(flip)
            .then(ToTensor)
            .then(Normalize::new(&config.mean, &config.std)?);

        Ok(Self { steps, augment })
    }

    pub fn augments(&self) -> bool {
        self.augment
    }
}

impl Transform<DynamicImage, Array3<f32>> for XrayTransform {
    fn apply(&self, img: DynamicImage) -> Result<Array3<f32>> {
        self.steps.apply(img)
    }
}
