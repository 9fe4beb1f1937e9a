use anyhow::{ensure, Result};
use rand::distr::{weighted::WeightedIndex, Distribution};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashSet;

/// A `Sampler` defines the order in which a split's records are visited.
///
/// # Associated type
/// - `Item`: The handle yielded by the iterator; a record index for index
///   samplers, `Vec<usize>` for batch samplers.
///
/// # Methods
/// - `iter(epoch)`: returns a sequential or shuffled sequence for that epoch.
///   Random samplers derive their RNG from `base_seed + epoch`, so each epoch
///   gets a fresh order and the sequence of orders is reproducible.
/// - `len()`: number of items one epoch yields.
///
/// Implementations must be `Send + Sync` so the loader can share a sampler
/// across passes.
pub trait Sampler: Send + Sync {
    type Item: Send + Sync;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The base seed, for samplers that have one.
    fn seed(&self) -> Option<u64> {
        None
    }
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    type Item = S::Item;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_> {
        (**self).iter(epoch)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn seed(&self) -> Option<u64> {
        (**self).seed()
    }
}

#[inline]
fn derive_rng_for_epoch(base_seed: u64, epoch: usize) -> StdRng {
    StdRng::seed_from_u64(base_seed.wrapping_add(epoch as u64))
}

/// ============================================================================
/// Yields indices sequentially in order `(0,1,2,...,dataset_size-1)`, the
/// same order every epoch. Used for `val` and `test`.
///
/// # Examples
/// ```ignore
/// let sampler = SequentialSampler::new(5);
/// let indices: Vec<_> = sampler.iter(0).collect();
/// assert_eq!(indices, vec![0, 1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct SequentialSampler {
    dataset_size: usize,
}

impl SequentialSampler {
    pub fn new(dataset_size: usize) -> Self {
        Self { dataset_size }
    }
}

impl Sampler for SequentialSampler {
    type Item = usize;

    fn iter(&self, _epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        Box::new(0..self.dataset_size)
    }

    fn len(&self) -> usize {
        self.dataset_size
    }
}

/// ============================================================================
/// A fresh permutation of `0..dataset_size` every epoch. Used for `train`.
///
/// # Seed Handling
/// - For each epoch the RNG is `base_seed + epoch`. At epoch 0 the RNG seed
///   is `base_seed`; at epoch 1 it is `base_seed + 1`.
/// - Fixed seed -> identical sequence of permutations every run.
///
/// # Example usage
/// ```ignore
/// let sampler = RandomSampler::new(1000, 42);
/// let epoch0: Vec<_> = sampler.iter(0).collect();
/// ```
#[derive(Debug, Clone)]
pub struct RandomSampler {
    dataset_size: usize,
    base_seed: u64,
}

impl RandomSampler {
    pub fn new(dataset_size: usize, base_seed: u64) -> Self {
        Self {
            dataset_size,
            base_seed,
        }
    }
}

impl Sampler for RandomSampler {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        let mut rng = derive_rng_for_epoch(self.base_seed, epoch);
        let mut indices: Vec<_> = (0..self.dataset_size).collect();
        indices.shuffle(&mut rng);
        Box::new(indices.into_iter())
    }

    fn len(&self) -> usize {
        self.dataset_size
    }

    fn seed(&self) -> Option<u64> {
        Some(self.base_seed)
    }
}

/// ============================================================================
/// Samples elements randomly from a predefined subset of indices, without
/// replacement. Each call to `iter(epoch)` returns a new deterministic
/// permutation of the provided indices.
///
/// # Example
/// ```ignore
/// // Only the first ten records of a 1000-record split
/// let sampler = SubsetRandomSampler::new(1000, (0..10).collect(), 42)?;
/// ```
#[derive(Debug, Clone)]
pub struct SubsetRandomSampler {
    indices: Vec<usize>,
    base_seed: u64,
}

impl SubsetRandomSampler {
    pub fn new(dataset_size: usize, indices: Vec<usize>, base_seed: u64) -> Result<Self> {
        ensure!(!indices.is_empty(), "Indices must not be empty");

        let mut seen_indices = HashSet::with_capacity(indices.len());
        for &index in &indices {
            ensure!(
                index < dataset_size,
                "Index {} out of bounds for dataset of size {}",
                index,
                dataset_size,
            );
            ensure!(
                seen_indices.insert(index),
                "Duplicate index {} found in SubsetRandomSampler",
                index
            );
        }
        Ok(Self { indices, base_seed })
    }
}

impl Sampler for SubsetRandomSampler {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        let mut rng = derive_rng_for_epoch(self.base_seed, epoch);
        let mut shuffled = self.indices.clone();
        shuffled.shuffle(&mut rng);
        Box::new(shuffled.into_iter())
    }

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn seed(&self) -> Option<u64> {
        Some(self.base_seed)
    }
}

/// ============================================================================
/// Draws indices with replacement according to per-record weights.
///
/// Paired with `IndexedDataset::sample_weights`, this rebalances the
/// NORMAL/PNEUMONIA classes so each epoch sees them in roughly equal
/// proportion.
///
/// # Arguments:
/// - `weights`: Relative weight for each index (need not sum to 1).
/// - `num_samples`: Draws per epoch (defaults to `weights.len()`).
/// - `base_seed`: Base RNG seed. See `RandomSampler` docs for details.
#[derive(Debug, Clone)]
pub struct WeightedRandomSampler {
    distribution: WeightedIndex<f64>,
    num_samples: usize,
    base_seed: u64,
}

impl WeightedRandomSampler {
    pub fn new(weights: &[f64], num_samples: Option<usize>, base_seed: u64) -> Result<Self> {
        ensure!(!weights.is_empty(), "The weights sequence must not be empty");
        ensure!(
            weights.iter().all(|&w| w >= 0.0 && w.is_finite()),
            "All weights must be finite and non-negative"
        );
        ensure!(
            weights.iter().any(|&w| w > 0.0),
            "All weights are zero - at least one weight must be positive"
        );

        let num_samples = num_samples.unwrap_or(weights.len());
        ensure!(
            num_samples > 0,
            "num_samples must be a positive integer value, but got num_samples={}",
            num_samples,
        );

        let distribution = WeightedIndex::new(weights)
            .map_err(|e| anyhow::anyhow!("Invalid sampling weights: {}", e))?;

        Ok(Self {
            distribution,
            num_samples,
            base_seed,
        })
    }
}

impl Sampler for WeightedRandomSampler {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        let mut rng = derive_rng_for_epoch(self.base_seed, epoch);
        Box::new((0..self.num_samples).map(move |_| self.distribution.sample(&mut rng)))
    }

    fn len(&self) -> usize {
        self.num_samples
    }

    fn seed(&self) -> Option<u64> {
        Some(self.base_seed)
    }
}

/// ============================================================================
/// Wraps a [`Sampler`] to yield mini-batches of indices.
///
/// Each call to `.iter(epoch)` produces successive `Vec<S::Item>` batches of
/// up to `batch_size` elements. If `drop_last` is `true`, a final batch
/// smaller than `batch_size` is discarded, giving `floor(S/B)` batches;
/// otherwise it is kept, giving `ceil(S/B)`.
///
/// # Example
/// ```ignore
/// let batch_sampler = BatchSampler::new(SequentialSampler::new(1000), 32, false)?;
/// for mini_batch in batch_sampler.iter(0) {
///     // `mini_batch` is Vec<usize> of length 32, except the last one (8)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BatchSampler<S> {
    sampler: S,
    batch_size: usize,
    drop_last: bool,
}

impl<S: Sampler> BatchSampler<S> {
    pub fn new(sampler: S, batch_size: usize, drop_last: bool) -> Result<Self> {
        ensure!(
            batch_size > 0,
            "batch_size must be > 0, but got batch_size={}",
            batch_size
        );
        Ok(Self {
            sampler,
            batch_size,
            drop_last,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn drop_last(&self) -> bool {
        self.drop_last
    }
}

impl<S: Sampler> Sampler for BatchSampler<S> {
    type Item = Vec<S::Item>;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_> {
        let mut sampler_iter = self.sampler.iter(epoch);
        let batch_size = self.batch_size;
        let drop_last = self.drop_last;

        Box::new(std::iter::from_fn(move || {
            let mini_batch: Vec<_> = sampler_iter.by_ref().take(batch_size).collect();
            if mini_batch.len() == batch_size || (!drop_last && !mini_batch.is_empty()) {
                Some(mini_batch)
            } else {
                None
            }
        }))
    }

    /// Number of batches per epoch.
    fn len(&self) -> usize {
        let items = self.sampler.len();
        if self.drop_last {
            items / self.batch_size
        } else {
            items.div_ceil(self.batch_size)
        }
    }

    fn seed(&self) -> Option<u64> {
        self.sampler.seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_sampler_is_stable() {
        let sampler = SequentialSampler::new(5);
        let epoch0: Vec<_> = sampler.iter(0).collect();
        let epoch9: Vec<_> = sampler.iter(9).collect();
        assert_eq!(epoch0, vec![0, 1, 2, 3, 4]);
        assert_eq!(epoch0, epoch9);
        assert_eq!(sampler.len(), 5);
        assert_eq!(sampler.seed(), None);
    }

    #[test]
    fn test_random_sampler_permutation_per_epoch() {
        let sampler = RandomSampler::new(50, 42);

        let epoch0: Vec<_> = sampler.iter(0).collect();
        let epoch1: Vec<_> = sampler.iter(1).collect();

        let mut sorted = epoch0.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());

        assert_ne!(epoch0, epoch1, "each epoch should reshuffle");
        assert_eq!(epoch0, sampler.iter(0).collect::<Vec<_>>());
        assert_eq!(
            epoch1,
            RandomSampler::new(50, 42).iter(1).collect::<Vec<_>>(),
            "same seed must replay the same sequence of shuffles"
        );
    }

    #[test]
    fn test_random_sampler_seed_changes_order() {
        let a: Vec<_> = RandomSampler::new(50, 1).iter(0).collect();
        let b: Vec<_> = RandomSampler::new(50, 2).iter(0).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_subset_random_sampler() -> Result<()> {
        let sampler = SubsetRandomSampler::new(100, vec![3, 7, 11], 42)?;
        let mut seen: Vec<_> = sampler.iter(0).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![3, 7, 11]);

        assert!(SubsetRandomSampler::new(10, vec![], 0).is_err());
        assert!(SubsetRandomSampler::new(10, vec![10], 0).is_err());
        assert!(SubsetRandomSampler::new(10, vec![1, 1], 0).is_err());
        Ok(())
    }

    #[test]
    fn test_weighted_random_sampler_respects_zero_weight() -> Result<()> {
        let sampler = WeightedRandomSampler::new(&[0.0, 1.0, 3.0], Some(200), 7)?;
        let draws: Vec<_> = sampler.iter(0).collect();
        assert_eq!(draws.len(), 200);
        assert!(draws.iter().all(|&i| i == 1 || i == 2));
        assert!(draws.iter().filter(|&&i| i == 2).count() > draws.iter().filter(|&&i| i == 1).count());
        assert_eq!(draws, sampler.iter(0).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_weighted_random_sampler_validation() {
        assert!(WeightedRandomSampler::new(&[], None, 0).is_err());
        assert!(WeightedRandomSampler::new(&[0.0, 0.0], None, 0).is_err());
        assert!(WeightedRandomSampler::new(&[1.0, f64::NAN], None, 0).is_err());
        assert!(WeightedRandomSampler::new(&[1.0], Some(0), 0).is_err());
    }

    #[test]
    fn test_batch_sampler_keep_partial() -> Result<()> {
        let batches: Vec<_> = BatchSampler::new(SequentialSampler::new(10), 4, false)?
            .iter(0)
            .collect();
        assert_eq!(batches, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
        Ok(())
    }

    #[test]
    fn test_batch_sampler_drop_partial() -> Result<()> {
        let sampler = BatchSampler::new(SequentialSampler::new(10), 4, true)?;
        let batches: Vec<_> = sampler.iter(0).collect();
        assert_eq!(batches, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
        assert_eq!(sampler.len(), 2);
        Ok(())
    }

    #[test]
    fn test_batch_count_law() -> Result<()> {
        for size in 0..20 {
            for batch_size in 1..7 {
                for drop_last in [false, true] {
                    let sampler =
                        BatchSampler::new(SequentialSampler::new(size), batch_size, drop_last)?;
                    let batches: Vec<_> = sampler.iter(0).collect();
                    let expected = if drop_last {
                        size / batch_size
                    } else {
                        size.div_ceil(batch_size)
                    };
                    assert_eq!(batches.len(), expected);
                    assert_eq!(sampler.len(), expected);

                    if !drop_last && size % batch_size != 0 {
                        assert_eq!(batches.last().map(Vec::len), Some(size % batch_size));
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_batch_sampler_rejects_zero() {
        assert!(BatchSampler::new(SequentialSampler::new(3), 0, false).is_err());
    }
}
