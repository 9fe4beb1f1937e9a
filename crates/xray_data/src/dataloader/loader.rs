//! src/dataloader/loader.rs
//!
//! DataLoader constructors and pass creation.
//!
//! # Constructor Overview
//!
//! ### Automatic Sampling
//! DataLoader creates the sampler based on `config.shuffle`:
//! - If `config.shuffle = false`, DataLoader creates a SequentialSampler.
//! - If `config.shuffle = true`, DataLoader creates a RandomSampler with `config.seed`.
//!
//! **Methods:**
//! - `new()` - Auto-sampling + default StackCollator
//! - `new_with_collator()` - Auto-sampling + custom Collator
//!
//! ### Custom sampling
//! Users provide an index sampler, DataLoader wraps it in a `BatchSampler`
//! using the configured `batch_size` and `drop_last`.
//!
//! **Methods:**
//! - `new_with_sampler()` - User provided sampler + default StackCollator
//! - `new_with_sampler_and_collator()` - User provided sampler + custom Collator
//!
//! # Seed Coordination
//!
//! The sampler's seed controls visiting order, while `config.seed` controls
//! transform randomness. A seeded custom sampler must use the same seed as the
//! config:
//!
//! ```ignore
//! let seed = 42;
//! let sampler = WeightedRandomSampler::new(&weights, None, seed)?;
//! let config = DataLoaderConfig::builder()
//!     .batch_size(32)
//!     .seed(seed)
//!     .build();
//! let dataloader = DataLoader::new_with_sampler(dataset, sampler, config)?;
//! ```
//!
//! # Passes
//! - `iter()` starts the next epoch: it hands out the current value of the
//!   epoch counter and advances it.
//! - `iter_epoch(e)` replays epoch `e` without touching the counter.

use crate::collator::{Collator, StackCollator};
use crate::dataset::Dataset;
use crate::error::DataError;
use crate::sampler::{BatchSampler, RandomSampler, Sampler, SequentialSampler};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::config::DataLoaderConfig;
use super::iterator::{DataLoaderIter, IteratorImpl};
use super::workers::{spawn_batch_workers, PassContext};

/// The main DataLoader struct that coordinates data loading
///
/// # Thread safety:
/// - `DataLoader` itself is Send + Sync and can be shared across threads.
/// - Each pass gets its own iterator, and with `num_workers > 0` its own
///   worker pool, so several passes may run side by side.
///
/// # Type parameters:
/// - `D`: Dataset type
/// - `C`: Collator type (defaults to StackCollator)
pub struct DataLoader<D, C = StackCollator> {
    dataset: Arc<D>,
    collator: C,
    config: DataLoaderConfig,
    batch_sampler: Box<dyn Sampler<Item = Vec<usize>>>,
    current_epoch: AtomicUsize,
}

impl<D> DataLoader<D, StackCollator>
where
    D: Dataset + 'static,
{
    /// Creates a new DataLoader with default StackCollator that manages
    /// sampling itself.
    ///
    /// # Example
    /// ```ignore
    /// let config = DataLoaderConfig::builder()
    ///     .batch_size(32)
    ///     .shuffle(true)
    ///     .seed(42)
    ///     .build();
    /// let dataloader = DataLoader::new(dataset, config)?;
    /// ```
    pub fn new(dataset: D, config: DataLoaderConfig) -> Result<Self> {
        Self::new_with_collator(dataset, config, StackCollator)
    }

    /// Creates a DataLoader with a user-provided index sampler and default
    /// StackCollator.
    ///
    /// # Errors
    /// - Returns error if `config.shuffle = true`
    /// - Returns error if the sampler is seeded with a value other than `config.seed`
    pub fn new_with_sampler(
        dataset: D,
        sampler: impl Sampler<Item = usize> + 'static,
        config: DataLoaderConfig,
    ) -> Result<Self> {
        Self::new_with_sampler_and_collator(dataset, sampler, config, StackCollator)
    }
}

impl<D, C> DataLoader<D, C>
where
    D: Dataset + 'static,
    C: Collator + Clone + Send + Sync + 'static,
{
    /// Creates a new DataLoader with automatic sampling and a custom collator.
    ///
    /// # Errors
    /// - `batch_size` is 0
    /// - `prefetch_factor` is 0 when using workers
    pub fn new_with_collator(dataset: D, config: DataLoaderConfig, collator: C) -> Result<Self> {
        config.validate()?;

        let sampler: Box<dyn Sampler<Item = usize>> = if config.shuffle {
            Box::new(RandomSampler::new(dataset.len(), config.seed))
        } else {
            Box::new(SequentialSampler::new(dataset.len()))
        };
        Self::build(dataset, sampler, config, collator)
    }

    pub fn new_with_sampler_and_collator(
        dataset: D,
        sampler: impl Sampler<Item = usize> + 'static,
        config: DataLoaderConfig,
        collator: C,
    ) -> Result<Self> {
        config.validate()?;

        if config.shuffle {
            return Err(anyhow!(DataError::config(
                "cannot set shuffle = true when providing a custom sampler; \
                 either let DataLoader::new() shuffle or shuffle inside the sampler"
            )));
        }

        if let Some(sampler_seed) = sampler.seed() {
            if sampler_seed != config.seed {
                return Err(anyhow!(DataError::config(format!(
                    "seed mismatch: sampler uses seed {} but config.seed is {}",
                    sampler_seed, config.seed
                ))));
            }
        }

        Self::build(dataset, Box::new(sampler), config, collator)
    }

    fn build(
        dataset: D,
        sampler: Box<dyn Sampler<Item = usize>>,
        config: DataLoaderConfig,
        collator: C,
    ) -> Result<Self> {
        let batch_sampler = BatchSampler::new(sampler, config.batch_size, config.drop_last)
            .context("Failed to wrap sampler with BatchSampler")?;

        Ok(Self {
            dataset: Arc::new(dataset),
            collator,
            config,
            batch_sampler: Box::new(batch_sampler),
            current_epoch: AtomicUsize::new(0),
        })
    }

    /// Starts a pass over the next epoch.
    ///
    /// The first call runs epoch 0, the next epoch 1, and so on. With
    /// `shuffle = true` each epoch visits the records in a new order.
    pub fn iter(&self) -> Result<DataLoaderIter<'_, D, C>> {
        let epoch = self.current_epoch.fetch_add(1, Ordering::SeqCst);
        self.iter_epoch(epoch)
    }

    /// Starts a pass over a specific epoch. Two passes over the same epoch
    /// yield identical batches.
    pub fn iter_epoch(&self, epoch: usize) -> Result<DataLoaderIter<'_, D, C>> {
        let pass = PassContext {
            seed: self.config.seed,
            epoch,
            policy: self.config.decode_error_policy,
        };
        let batch_indices = self.batch_sampler.iter(epoch);

        debug!(
            epoch,
            batches = self.num_batches(),
            num_workers = self.config.num_workers,
            "starting pass"
        );

        let inner = if self.config.num_workers > 0 {
            let pool = spawn_batch_workers(
                Arc::clone(&self.dataset),
                self.collator.clone(),
                &self.config,
                pass,
            )?;
            IteratorImpl::Multi {
                pool,
                batch_indices,
                max_in_flight: self.config.max_in_flight(),
                timeout: self.config.timeout,
                next_to_send: 0,
                next_to_yield: 0,
                reorder: BTreeMap::new(),
            }
        } else {
            IteratorImpl::Single {
                dataset: self.dataset.as_ref(),
                collator: &self.collator,
                batch_indices,
                batch_index: 0,
            }
        };

        Ok(DataLoaderIter::new(inner, pass))
    }
}

impl<D, C> DataLoader<D, C>
where
    D: Dataset,
{
    /// Number of batches one pass yields, before any skipped records.
    pub fn num_batches(&self) -> usize {
        self.batch_sampler.len()
    }

    /// Number of records in the dataset.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// The epoch the next call to `iter()` will run.
    pub fn epoch(&self) -> usize {
        self.current_epoch.load(Ordering::SeqCst)
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn config(&self) -> &DataLoaderConfig {
        &self.config
    }
}
