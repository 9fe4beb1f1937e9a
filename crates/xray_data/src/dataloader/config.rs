//! src/dataloader/config.rs
//!
//! Configuration for DataLoader behaviour
//!
//! The `DataLoaderConfig` struct stores the parameters that control
//! how batches are produced.
//!
//! Example:
//! ```ignore
//! let config = DataLoaderConfig::builder()
//!     .batch_size(32)
//!     .num_workers(4)
//!     .prefetch_factor(2)
//!     .shuffle(true)
//!     .seed(42)
//!     .build();
//! ```
//!
//! # Performance considerations:
//! - `num_workers`: More workers decode more images in parallel but each holds
//!   up to `prefetch_factor` decoded batches.
//! - `prefetch_factor`: Higher values smooth out slow files at the cost of memory.

use crate::error::DataError;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a pass does when a record cannot be read or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// Yield the error naming the file, then end the pass.
    #[default]
    Abort,
    /// Drop the record, log it, and keep going.
    Skip,
}

/// Configuration for DataLoader
#[derive(Debug, Clone, PartialEq)]
pub struct DataLoaderConfig {
    /// Number of samples per batch
    pub batch_size: usize,
    /// Number of parallel workers (0 = decode on the calling thread)
    pub num_workers: usize,
    /// Whether to drop the last incomplete batch
    pub drop_last: bool,
    /// Whether to reshuffle the records every pass.
    /// Must stay false when providing a custom sampler.
    pub shuffle: bool,
    /// Random seed for shuffling and randomized transforms
    pub seed: u64,
    /// Number of batches in flight per worker (must be >0 when using workers)
    pub prefetch_factor: usize,
    /// Maximum time to wait for the next batch from workers.
    /// If exceeded, the pass fails (assuming workers are stuck). Default: 30s
    pub timeout: Duration,
    /// How often idle workers check for the shutdown signal.
    /// Not an error timeout - just a polling interval. Default: 100ms.
    pub worker_timeout: Duration,
    /// Behaviour on unreadable or corrupt images
    pub decode_error_policy: DecodeErrorPolicy,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            num_workers: 0,
            drop_last: false,
            shuffle: false,
            seed: 42,
            prefetch_factor: 2,
            timeout: Duration::from_secs(30),
            worker_timeout: Duration::from_millis(100),
            decode_error_policy: DecodeErrorPolicy::Abort,
        }
    }
}

impl DataLoaderConfig {
    pub fn builder() -> DataLoaderConfigBuilder {
        DataLoaderConfigBuilder::default()
    }

    /// Rejects settings no pass could run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow!(DataError::config("batch_size must be greater than 0")));
        }
        if self.num_workers > 0 && self.prefetch_factor == 0 {
            return Err(anyhow!(DataError::config(format!(
                "prefetch_factor must be > 0 when using {} workers",
                self.num_workers
            ))));
        }
        if self.timeout.is_zero() {
            return Err(anyhow!(DataError::config("timeout must be non-zero")));
        }
        if self.worker_timeout.is_zero() {
            return Err(anyhow!(DataError::config("worker_timeout must be non-zero")));
        }
        Ok(())
    }

    /// Maximum number of batches sent to workers and not yet yielded.
    pub fn max_in_flight(&self) -> usize {
        self.num_workers * self.prefetch_factor
    }
}

/// Builder for DataLoaderConfig with method chaining
#[derive(Default)]
pub struct DataLoaderConfigBuilder {
    config: DataLoaderConfig,
}

impl DataLoaderConfigBuilder {
    /// Set the batch size (must be > 0)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the number of workers
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    /// Set whether to drop_last
    pub fn drop_last(mut self, drop: bool) -> Self {
        self.config.drop_last = drop;
        self
    }

    /// Set whether to shuffle the records every pass
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Set the random seed for reproducible data loading.
    ///
    /// This seed controls:
    /// - Record shuffling (if shuffle = true)
    /// - Random transforms in workers
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set the number of batches each worker may have in flight.
    pub fn prefetch_factor(mut self, factor: usize) -> Self {
        self.config.prefetch_factor = factor;
        self
    }

    /// Set the timeout for receiving a batch.
    ///
    /// - Too low: May fail passes during legitimately slow decoding
    /// - Too high: Delays detection of stuck workers.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the worker polling interval
    pub fn worker_timeout(mut self, worker_timeout: Duration) -> Self {
        self.config.worker_timeout = worker_timeout;
        self
    }

    pub fn decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.config.decode_error_policy = policy;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> DataLoaderConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DataLoaderConfig::default();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.num_workers, 0);
        assert!(!config.drop_last);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.decode_error_policy, DecodeErrorPolicy::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let err = DataLoaderConfig::builder().batch_size(0).build().validate().unwrap_err();
        assert!(matches!(DataError::find(&err), Some(DataError::Config { .. })));

        let config = DataLoaderConfig::builder()
            .num_workers(2)
            .prefetch_factor(0)
            .build();
        assert!(config.validate().is_err());

        // prefetch_factor is irrelevant without workers
        let config = DataLoaderConfig::builder().prefetch_factor(0).build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_in_flight() {
        let config = DataLoaderConfig::builder()
            .num_workers(3)
            .prefetch_factor(4)
            .build();
        assert_eq!(config.max_in_flight(), 12);
    }
}
