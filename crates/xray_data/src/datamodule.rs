//! src/datamodule.rs
//!
//! `XrayDataModule` bundles configuration, indexing and per-split loaders.
//!
//! ```ignore
//! let mut module = XrayDataModule::new(DataConfig::from_json_file("data.json")?)?;
//! module.setup(Stage::Fit)?;
//!
//! for _ in 0..10 {
//!     // Each pass over the same loader is the next epoch
//!     for batch in module.train_dataloader()?.iter()? {
//!         let batch = batch?;
//!     }
//! }
//! ```
//!
//! The indexer runs on the first `setup` call; later calls reuse its result
//! and only build the loaders the stage needs. Loaders live as long as the
//! module, so their epoch counters keep advancing across passes.

use crate::config::DataConfig;
use crate::dataloader::DataLoader;
use crate::dataset::SplitDataset;
use crate::error::DataError;
use crate::indexer::{DatasetIndexer, IndexedDataset, LabelCounts};
use crate::record::Split;
use crate::sampler::WeightedRandomSampler;
use crate::transforms::vision::{LoadImageToSample, XrayTransform};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// The dataset type every split is loaded through.
pub type XrayDataset = SplitDataset<LoadImageToSample<XrayTransform>>;

/// Which splits `setup` prepares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `train` and `val`
    Fit,
    /// `val` only
    Validate,
    /// `test` only
    Test,
    /// Every split
    All,
}

impl Stage {
    pub fn splits(&self) -> &'static [Split] {
        match self {
            Stage::Fit => &[Split::Train, Split::Val],
            Stage::Validate => &[Split::Val],
            Stage::Test => &[Split::Test],
            Stage::All => &Split::ALL,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fit => "fit",
            Stage::Validate => "validate",
            Stage::Test => "test",
            Stage::All => "all",
        })
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fit" => Ok(Stage::Fit),
            "validate" => Ok(Stage::Validate),
            "test" => Ok(Stage::Test),
            "all" => Ok(Stage::All),
            other => Err(anyhow!(
                "Unknown stage '{}' (expected one of: fit, validate, test, all)",
                other
            )),
        }
    }
}

pub struct XrayDataModule {
    config: DataConfig,
    indexed: Option<IndexedDataset>,
    loaders: BTreeMap<Split, DataLoader<XrayDataset>>,
}

impl XrayDataModule {
    /// Validates the configuration. Nothing is read from disk until `setup`.
    pub fn new(config: DataConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            indexed: None,
            loaders: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Indexes the dataset root (first call only) and builds the loaders of
    /// `stage`. Loaders that already exist are kept, epoch counter included.
    pub fn setup(&mut self, stage: Stage) -> Result<()> {
        if self.indexed.is_none() {
            let indexer = DatasetIndexer::new(self.config.indexer_config())?;
            self.indexed = Some(indexer.index()?);
        }

        for &split in stage.splits() {
            if self.loaders.contains_key(&split) {
                continue;
            }
            let loader = self.build_loader(split)?;
            debug!(%split, records = loader.len(), batches = loader.num_batches(), "loader ready");
            self.loaders.insert(split, loader);
        }
        info!(%stage, "setup complete");
        Ok(())
    }

    /// `train` is shuffled (or class-balanced) and augmented; `val` and
    /// `test` are visited in index order.
    fn build_loader(&self, split: Split) -> Result<DataLoader<XrayDataset>> {
        let indexed = self.indexed()?;
        let pipeline = XrayTransform::new(&self.config.transform_config(), split == Split::Train)
            .with_context(|| format!("Failed to build {} transform", split))?;
        let dataset = SplitDataset::new(
            split,
            indexed.shared_records(split),
            indexed.shared_class_index(),
            LoadImageToSample::new(pipeline),
        )?;
        let config = self.config.loader_config(split);

        if split == Split::Train && self.config.balance_classes {
            let weights = indexed.sample_weights(split);
            let sampler = WeightedRandomSampler::new(&weights, None, self.config.seed)
                .context("Failed to build class-balancing sampler")?;
            return DataLoader::new_with_sampler(dataset, sampler, config);
        }
        DataLoader::new(dataset, config)
    }

    /// The indexer's output. Errors before the first `setup`.
    pub fn indexed(&self) -> Result<&IndexedDataset> {
        self.indexed.as_ref().ok_or_else(|| {
            anyhow!(DataError::config("setup() must be called before accessing the index"))
        })
    }

    pub fn dataset(&self, split: Split) -> Result<&XrayDataset> {
        Ok(self.dataloader(split)?.dataset())
    }

    /// The loader of `split`. Every call returns the same loader, so each
    /// `iter()` on it starts the next epoch.
    pub fn dataloader(&self, split: Split) -> Result<&DataLoader<XrayDataset>> {
        self.loaders.get(&split).ok_or_else(|| {
            anyhow!(DataError::config(format!(
                "{} split is not set up; call setup() with a stage that includes it",
                split
            )))
        })
    }

    pub fn train_dataloader(&self) -> Result<&DataLoader<XrayDataset>> {
        self.dataloader(Split::Train)
    }

    pub fn val_dataloader(&self) -> Result<&DataLoader<XrayDataset>> {
        self.dataloader(Split::Val)
    }

    pub fn test_dataloader(&self) -> Result<&DataLoader<XrayDataset>> {
        self.dataloader(Split::Test)
    }

    /// Class name to label index, e.g. `{"NORMAL": 0, "PNEUMONIA": 1}`.
    pub fn class_to_idx(&self) -> Result<BTreeMap<String, usize>> {
        Ok(self.indexed()?.class_index().to_map())
    }

    /// Label index to class name, the inverse of `class_to_idx`.
    pub fn idx_to_class(&self) -> Result<BTreeMap<usize, String>> {
        Ok(self
            .class_to_idx()?
            .into_iter()
            .map(|(name, idx)| (idx, name))
            .collect())
    }

    pub fn label_counts(&self) -> Result<LabelCounts> {
        Ok(self.indexed()?.label_counts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_splits() -> Result<()> {
        assert_eq!(Stage::Fit.splits(), &[Split::Train, Split::Val]);
        assert_eq!("test".parse::<Stage>()?, Stage::Test);
        assert!("predict".parse::<Stage>().is_err());
        Ok(())
    }

    #[test]
    fn test_accessors_before_setup() -> Result<()> {
        let module = XrayDataModule::new(DataConfig::new("/nonexistent"))?;
        assert!(module.class_to_idx().is_err());
        let err = module.test_dataloader().err().expect("not set up");
        assert!(matches!(DataError::find(&err), Some(DataError::Config { .. })));
        Ok(())
    }

    #[test]
    fn test_setup_missing_root_fails() -> Result<()> {
        let mut module = XrayDataModule::new(DataConfig::new("/nonexistent/chest_xray"))?;
        let err = module.setup(Stage::Test).unwrap_err();
        assert!(matches!(DataError::find(&err), Some(DataError::Config { .. })));
        Ok(())
    }
}
