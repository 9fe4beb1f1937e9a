//! Whole-pipeline configuration, loadable from a JSON file.
//!
//! Every field is defaulted, so `{}` is a valid config and a file only needs
//! the values it changes:
//!
//! ```json
//! {
//!   "root": "./chest_xray",
//!   "resplit": true,
//!   "val_ratio": 0.1,
//!   "batch_size": 32,
//!   "num_workers": 4
//! }
//! ```
//!
//! `DataConfig` is split into the indexer, loader and transform configs the
//! rest of the crate consumes.

use crate::dataloader::{DataLoaderConfig, DecodeErrorPolicy};
use crate::error::DataError;
use crate::indexer::{IndexerConfig, UnknownClassPolicy};
use crate::record::Split;
use crate::transforms::vision::TransformConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    // Indexing
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub resplit: bool,
    pub val_ratio: f64,
    pub unknown_class_policy: UnknownClassPolicy,

    /// Seed for the resplit, the train shuffle and augmentation.
    pub seed: u64,

    // Loading
    pub batch_size: usize,
    pub num_workers: usize,
    pub prefetch_factor: usize,
    /// Drop the short final batch. Only applies to `train`; `val` and `test`
    /// always cover every record.
    pub drop_last: bool,
    pub timeout_secs: u64,
    pub decode_error_policy: DecodeErrorPolicy,
    /// Draw `train` records with inverse-frequency weights instead of a
    /// plain shuffle.
    pub balance_classes: bool,

    // Preprocessing
    pub resize: u32,
    pub crop: u32,
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
    /// Horizontal flip probability for `train` images; 0 disables it.
    pub flip_probability: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        let indexer = IndexerConfig::default();
        let loader = DataLoaderConfig::default();
        let transform = TransformConfig::default();
        Self {
            root: indexer.root,
            extensions: indexer.extensions,
            resplit: indexer.resplit,
            val_ratio: indexer.val_ratio,
            unknown_class_policy: indexer.unknown_class_policy,
            seed: indexer.seed,
            batch_size: 32,
            num_workers: loader.num_workers,
            prefetch_factor: loader.prefetch_factor,
            drop_last: loader.drop_last,
            timeout_secs: loader.timeout.as_secs(),
            decode_error_policy: loader.decode_error_policy,
            balance_classes: false,
            resize: transform.resize,
            crop: transform.crop,
            mean: transform.mean,
            std: transform.std,
            flip_probability: transform.flip_probability,
        }
    }
}

impl DataConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| anyhow!(DataError::config(format!("invalid config: {}", e))))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!(path = %path.display(), "loaded data config");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig {
            root: self.root.clone(),
            extensions: self.extensions.clone(),
            resplit: self.resplit,
            val_ratio: self.val_ratio,
            seed: self.seed,
            unknown_class_policy: self.unknown_class_policy,
        }
    }

    /// Loader settings for `split`: `train` is shuffled (unless class
    /// balancing supplies its own sampler) and honours `drop_last`.
    pub fn loader_config(&self, split: Split) -> DataLoaderConfig {
        let is_train = split == Split::Train;
        DataLoaderConfig::builder()
            .batch_size(self.batch_size)
            .num_workers(self.num_workers)
            .prefetch_factor(self.prefetch_factor)
            .drop_last(is_train && self.drop_last)
            .shuffle(is_train && !self.balance_classes)
            .seed(self.seed)
            .timeout(Duration::from_secs(self.timeout_secs))
            .decode_error_policy(self.decode_error_policy)
            .build()
    }

    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            resize: self.resize,
            crop: self.crop,
            mean: self.mean.clone(),
            std: self.std.clone(),
            flip_probability: self.flip_probability,
        }
    }

    /// Checks every derived config without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.flip_probability) {
            return Err(anyhow!(DataError::config(format!(
                "flip_probability must lie in [0, 1], got {}",
                self.flip_probability
            ))));
        }
        if self.crop > self.resize {
            return Err(anyhow!(DataError::config(format!(
                "crop {} must not exceed resize {}",
                self.crop, self.resize
            ))));
        }
        if self.mean.len() != 3 || self.std.len() != 3 {
            return Err(anyhow!(DataError::config(
                "mean and std need exactly 3 values, one per RGB channel"
            )));
        }
        for split in Split::ALL {
            self.loader_config(split).validate()?;
        }
        crate::indexer::DatasetIndexer::new(self.indexer_config())?;
        Ok(())
    }
}
