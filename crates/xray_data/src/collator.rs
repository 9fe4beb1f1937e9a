use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use anyhow::{bail, Context, Result};
use ndarray::{ArrayView3, Axis};

/// A `Collator` defines how to combine multiple [`Sample`]s into a [`MiniBatch`].
pub trait Collator {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch>;
}

/// A `Collator` that simply stacks image tensors with identical shapes
/// along the batch dimension (axis 0). It does not pad or resize, so if any
/// sample has an inconsistent shape, an error is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackCollator;

impl Collator for StackCollator {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch> {
        if samples.is_empty() {
            bail!("Cannot collate empty sample list");
        }

        // Validate that tensor shapes are compatible for stacking
        let reference_shape = samples[0].shape();
        for (i, sample) in samples.iter().enumerate().skip(1) {
            if sample.shape() != reference_shape {
                bail!(
                    "Shape mismatch in sample {} ({}): expected {:?}, got {:?}",
                    i,
                    sample.path.display(),
                    reference_shape,
                    sample.shape()
                );
            }
        }

        let views: Vec<ArrayView3<'_, f32>> = samples.iter().map(|s| s.image.view()).collect();
        let images = ndarray::stack(Axis(0), &views)
            .with_context(|| format!("Failed to stack {} image tensors", samples.len()))?;

        Ok(MiniBatch {
            images,
            labels: samples.iter().map(|s| s.label).collect(),
            paths: samples.iter().map(|s| s.path.clone()).collect(),
        })
    }
}
