use crate::dataloader::worker_gen_bool;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::DynamicImage;

// ============================================================================
// RandomHorizontalFlip
// ============================================================================

/// Randomly mirrors an X-ray left-to-right during training.
///
/// The coin flip comes from the thread-local worker RNG, which the loader
/// re-seeds per `(seed, epoch, batch)`, so the same pass always flips the
/// same images. A probability of 0.0 never touches the RNG.
///
/// # Example
/// ```ignore
/// let flip = RandomHorizontalFlip::new(0.5)?; // 50% flip chance
/// let augmented = flip.apply(image)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "Probability must be in [0.0, 1.0] range (got {})",
            p
        );
        Ok(Self { p })
    }

    pub fn probability(&self) -> f64 {
        self.p
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomHorizontalFlip {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let flip = match self.p {
            p if p <= 0.0 => false,
            p if p >= 1.0 => true,
            p => worker_gen_bool(p),
        };
        Ok(if flip { img.fliph() } else { img })
    }
}
