//! src/indexer.rs
//!
//! The `DatasetIndexer` turns a directory tree into labeled records.
//!
//! # Expected layout
//!
//! ```text
//! root/
//! ├── train/
//! │   ├── NORMAL/*.jpeg
//! │   └── PNEUMONIA/*.jpeg
//! ├── val/
//! │   ├── NORMAL/*.jpeg
//! │   └── PNEUMONIA/*.jpeg
//! └── test/
//!     ├── NORMAL/*.jpeg
//!     └── PNEUMONIA/*.jpeg
//! ```
//!
//! Labels come from the class directory name; no file is opened. Listings
//! are sorted by path so the record order, and therefore the resplit, only
//! depends on which files exist.
//!
//! # Resplit mode
//!
//! The published `val` split holds a handful of images. With `resplit`
//! enabled, `train` and `val` are pooled, shuffled with the configured seed
//! and cut so that `val` receives `round(N * val_ratio)` records. `test` is
//! never touched.

use crate::error::DataError;
use crate::label::{ClassIndex, ClassName};
use crate::readers::{DataSource, ImageDirSource};
use crate::record::{Record, Split};
use anyhow::{anyhow, Context, Result};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What to do with a class directory whose name is not a known class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownClassPolicy {
    /// Abort indexing with `DataError::Label`.
    #[default]
    Fail,
    /// Skip the directory and log a warning.
    Ignore,
}

/// Configuration for the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Dataset root containing `train/`, `val/` and `test/`.
    pub root: PathBuf,
    /// Allowed image extensions, case-insensitive.
    pub extensions: Vec<String>,
    /// Pool train+val and carve a new validation split.
    pub resplit: bool,
    /// Fraction of the pooled records that becomes `val` when resplitting.
    pub val_ratio: f64,
    /// Seed for the resplit shuffle.
    pub seed: u64,
    pub unknown_class_policy: UnknownClassPolicy,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("chest_xray"),
            extensions: vec!["jpeg".into(), "jpg".into(), "png".into()],
            resplit: false,
            val_ratio: 0.1,
            seed: 42,
            unknown_class_policy: UnknownClassPolicy::Fail,
        }
    }
}

impl IndexerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Enables resplit mode with the given validation fraction.
    pub fn resplit(mut self, val_ratio: f64) -> Self {
        self.resplit = true;
        self.val_ratio = val_ratio;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn unknown_class_policy(mut self, policy: UnknownClassPolicy) -> Self {
        self.unknown_class_policy = policy;
        self
    }

    pub fn extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.extensions = extensions.iter().map(|e| e.as_ref().to_string()).collect();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(anyhow!(DataError::config(
                "at least one image extension must be allowed"
            )));
        }
        if self.resplit && !(self.val_ratio > 0.0 && self.val_ratio < 1.0) {
            return Err(anyhow!(DataError::config(format!(
                "val_ratio must lie in (0, 1), got {}",
                self.val_ratio
            ))));
        }
        Ok(())
    }
}

/// Walks the dataset root and produces an [`IndexedDataset`].
#[derive(Debug, Clone)]
pub struct DatasetIndexer {
    config: IndexerConfig,
}

impl DatasetIndexer {
    pub fn new(config: IndexerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Indexes every split. Runs to completion before any loading starts.
    pub fn index(&self) -> Result<IndexedDataset> {
        let root = &self.config.root;
        if !root.is_dir() {
            return Err(anyhow!(DataError::config(format!(
                "dataset root {} does not exist or is not a directory",
                root.display()
            ))));
        }

        let mut discovered = BTreeSet::new();
        let mut splits = BTreeMap::new();
        for split in Split::ALL {
            let records = self
                .index_split(split, &mut discovered)
                .with_context(|| format!("Failed to index {} split", split))?;
            splits.insert(split, records);
        }

        // The class set is closed: both classes must show up somewhere.
        for class in ClassName::ALL {
            if !discovered.contains(&class) {
                return Err(anyhow!(DataError::config(format!(
                    "class directory {} was not found in any split under {}",
                    class,
                    root.display()
                ))));
            }
        }
        let class_index = ClassIndex::new(discovered)?;

        if self.config.resplit {
            let train = splits.remove(&Split::Train).unwrap_or_default();
            let val = splits.remove(&Split::Val).unwrap_or_default();
            let (train, val) = resplit(train, val, self.config.val_ratio, self.config.seed)?;
            info!(
                seed = self.config.seed,
                val_ratio = self.config.val_ratio,
                train = train.len(),
                val = val.len(),
                "resplit train+val"
            );
            splits.insert(Split::Train, train);
            splits.insert(Split::Val, val);
        }

        for split in Split::ALL {
            if splits.get(&split).map_or(true, Vec::is_empty) {
                return Err(anyhow!(DataError::config(format!(
                    "required split '{}' has no images under {}",
                    split,
                    root.display()
                ))));
            }
        }

        let indexed = IndexedDataset {
            class_index: Arc::new(class_index),
            splits: splits
                .into_iter()
                .map(|(split, records)| (split, Arc::from(records)))
                .collect(),
        };
        info!(
            root = %root.display(),
            train = indexed.len(Split::Train),
            val = indexed.len(Split::Val),
            test = indexed.len(Split::Test),
            "indexed dataset"
        );
        Ok(indexed)
    }

    fn index_split(&self, split: Split, discovered: &mut BTreeSet<ClassName>) -> Result<Vec<Record>> {
        let split_dir = self.config.root.join(split.as_str());
        if !split_dir.is_dir() {
            if split == Split::Val && self.config.resplit {
                debug!(dir = %split_dir.display(), "no val directory, resplit will fill it");
                return Ok(Vec::new());
            }
            return Err(anyhow!(DataError::config(format!(
                "missing split directory {}",
                split_dir.display()
            ))));
        }

        let mut records = Vec::new();
        for (class, class_dir) in self.class_dirs(&split_dir)? {
            discovered.insert(class);
            let source = ImageDirSource::new(&class_dir, &self.config.extensions, false);
            for path in source.stream()? {
                records.push(Record::new(path?, class));
            }
        }
        debug!(%split, records = records.len(), "indexed split");
        Ok(records)
    }

    /// Class subdirectories of a split directory, sorted by name. Plain files
    /// directly under the split directory are not class directories and are
    /// ignored; symlinks are skipped with a warning.
    fn class_dirs(&self, split_dir: &Path) -> Result<Vec<(ClassName, PathBuf)>> {
        let mut class_dirs = Vec::new();
        let walker = WalkDir::new(split_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry
                .with_context(|| format!("Failed to list {}", split_dir.display()))?;
            if !entry.file_type().is_dir() {
                if entry.path_is_symlink() {
                    warn!(path = %entry.path().display(), "skipping symlink in split directory; links are not followed");
                }
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            match name.parse::<ClassName>() {
                Ok(class) => class_dirs.push((class, entry.path().to_path_buf())),
                Err(_) => match self.config.unknown_class_policy {
                    UnknownClassPolicy::Fail => {
                        return Err(anyhow!(DataError::Label {
                            name: name.into_owned(),
                            path: entry.path().to_path_buf(),
                        }))
                    }
                    UnknownClassPolicy::Ignore => {
                        warn!(dir = %entry.path().display(), "ignoring unrecognized class directory");
                    }
                },
            }
        }
        Ok(class_dirs)
    }
}

/// Pools `train` then `val`, shuffles with `seed`, and cuts off
/// `round(N * val_ratio)` records for validation.
pub fn resplit(
    train: Vec<Record>,
    val: Vec<Record>,
    val_ratio: f64,
    seed: u64,
) -> Result<(Vec<Record>, Vec<Record>)> {
    let mut pooled = train;
    pooled.extend(val);

    let total = pooled.len();
    let val_size = (total as f64 * val_ratio).round() as usize;
    if val_size == 0 || val_size >= total {
        return Err(anyhow!(DataError::config(format!(
            "resplitting {} records with val_ratio {} leaves an empty split",
            total, val_ratio
        ))));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    pooled.shuffle(&mut rng);
    let val = pooled.split_off(total - val_size);
    Ok((pooled, val))
}

/// The authoritative record lists and class index of one loading session.
///
/// Record lists are shared read-only with loaders through `Arc<[Record]>`.
#[derive(Debug, Clone)]
pub struct IndexedDataset {
    class_index: Arc<ClassIndex>,
    splits: BTreeMap<Split, Arc<[Record]>>,
}

impl IndexedDataset {
    /// Builds an index from already-discovered records.
    pub fn from_records(
        class_index: ClassIndex,
        splits: impl IntoIterator<Item = (Split, Vec<Record>)>,
    ) -> Self {
        let mut map: BTreeMap<Split, Arc<[Record]>> = splits
            .into_iter()
            .map(|(split, records)| (split, Arc::from(records)))
            .collect();
        for split in Split::ALL {
            map.entry(split).or_insert_with(|| Arc::from(Vec::new()));
        }
        Self {
            class_index: Arc::new(class_index),
            splits: map,
        }
    }

    pub fn class_index(&self) -> &ClassIndex {
        &self.class_index
    }

    pub fn shared_class_index(&self) -> Arc<ClassIndex> {
        Arc::clone(&self.class_index)
    }

    pub fn records(&self, split: Split) -> &[Record] {
        self.splits.get(&split).map(|r| &r[..]).unwrap_or(&[])
    }

    pub fn shared_records(&self, split: Split) -> Arc<[Record]> {
        self.splits
            .get(&split)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn len(&self, split: Split) -> usize {
        self.records(split).len()
    }

    pub fn total(&self) -> usize {
        Split::ALL.iter().map(|&s| self.len(s)).sum()
    }

    /// Number of records per split and class.
    pub fn label_counts(&self) -> LabelCounts {
        let mut counts = LabelCounts::default();
        for split in Split::ALL {
            let row = counts.0.entry(split).or_default();
            for class in self.class_index.classes() {
                row.insert(*class, 0);
            }
            for record in self.records(split) {
                *row.entry(record.label).or_default() += 1;
            }
        }
        counts
    }

    /// Inverse-frequency weight per class index: `N / (K * count)`.
    /// A class with no records in the split gets weight 0.
    pub fn class_weights(&self, split: Split) -> Vec<f64> {
        let records = self.records(split);
        let k = self.class_index.len();
        let mut counts = vec![0usize; k];
        for record in records {
            if let Some(i) = self.class_index.index_of(record.label) {
                counts[i] += 1;
            }
        }
        counts
            .into_iter()
            .map(|count| {
                if count == 0 {
                    0.0
                } else {
                    records.len() as f64 / (k as f64 * count as f64)
                }
            })
            .collect()
    }

    /// One weight per record (its class weight), for `WeightedRandomSampler`.
    pub fn sample_weights(&self, split: Split) -> Vec<f64> {
        let class_weights = self.class_weights(split);
        self.records(split)
            .iter()
            .map(|r| {
                self.class_index
                    .index_of(r.label)
                    .map_or(0.0, |i| class_weights[i])
            })
            .collect()
    }
}

/// Per-split, per-class record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCounts(BTreeMap<Split, BTreeMap<ClassName, usize>>);

impl LabelCounts {
    pub fn get(&self, split: Split, class: ClassName) -> usize {
        self.0
            .get(&split)
            .and_then(|row| row.get(&class))
            .copied()
            .unwrap_or(0)
    }

    pub fn split_total(&self, split: Split) -> usize {
        self.0.get(&split).map_or(0, |row| row.values().sum())
    }

    pub fn class_total(&self, class: ClassName) -> usize {
        self.0.values().filter_map(|row| row.get(&class)).sum()
    }
}

/// Renders the counts as a table, one row per split.
impl fmt::Display for LabelCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8}", "")?;
        for class in ClassName::ALL {
            write!(f, "{:>11}", class.as_str())?;
        }
        writeln!(f)?;
        for split in Split::ALL {
            write!(f, "{:<8}", split.as_str())?;
            for class in ClassName::ALL {
                write!(f, "{:>11}", self.get(split, class))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::{tempdir, TempDir};

    /// Builds a tree of empty `.jpeg` files; nothing is decoded while indexing.
    fn make_tree(layout: &[(&str, &str, usize)]) -> Result<TempDir> {
        let dir = tempdir()?;
        for &(split, class, n) in layout {
            let class_dir = dir.path().join(split).join(class);
            fs::create_dir_all(&class_dir)?;
            for i in 0..n {
                File::create(class_dir.join(format!("img_{:03}.jpeg", i)))?;
            }
        }
        Ok(dir)
    }

    fn standard_tree() -> Result<TempDir> {
        make_tree(&[
            ("train", "NORMAL", 3),
            ("train", "PNEUMONIA", 9),
            ("val", "NORMAL", 1),
            ("val", "PNEUMONIA", 1),
            ("test", "NORMAL", 2),
            ("test", "PNEUMONIA", 3),
        ])
    }

    #[test]
    fn test_resplit_sizes_and_reproducibility() -> Result<()> {
        let records: Vec<Record> = (0..16)
            .map(|i| Record::new(format!("{:02}.jpeg", i), ClassName::Normal))
            .collect();
        let (train, val) = resplit(records[..14].to_vec(), records[14..].to_vec(), 0.1, 42)?;
        assert_eq!(val.len(), 2);
        assert_eq!(train.len(), 14);

        let (train2, val2) = resplit(records[..14].to_vec(), records[14..].to_vec(), 0.1, 42)?;
        assert_eq!(train, train2);
        assert_eq!(val, val2);
        Ok(())
    }

    #[test]
    fn test_resplit_rejects_empty_result() {
        let records = vec![Record::new("a.jpeg", ClassName::Normal)];
        assert!(resplit(records.clone(), vec![], 0.1, 0).is_err());
        assert!(resplit(records, vec![], 0.9, 0).is_err());
    }

    #[test]
    fn test_index_counts_match_layout() -> Result<()> {
        let dir = standard_tree()?;
        let indexed = DatasetIndexer::new(IndexerConfig::new(dir.path()))?.index()?;
        let counts = indexed.label_counts();

        assert_eq!(counts.get(Split::Train, ClassName::Normal), 3);
        assert_eq!(counts.get(Split::Train, ClassName::Pneumonia), 9);
        assert_eq!(counts.get(Split::Val, ClassName::Normal), 1);
        assert_eq!(counts.get(Split::Val, ClassName::Pneumonia), 1);
        assert_eq!(counts.get(Split::Test, ClassName::Normal), 2);
        assert_eq!(counts.get(Split::Test, ClassName::Pneumonia), 3);
        assert_eq!(counts.class_total(ClassName::Pneumonia), 13);
        assert_eq!(indexed.total(), 19);
        Ok(())
    }

    #[test]
    fn test_label_counts_table() -> Result<()> {
        let dir = standard_tree()?;
        let indexed = DatasetIndexer::new(IndexerConfig::new(dir.path()))?.index()?;
        let table = indexed.label_counts().to_string();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("NORMAL") && lines[0].contains("PNEUMONIA"));
        assert_eq!(
            lines[1].split_whitespace().collect::<Vec<_>>(),
            vec!["train", "3", "9"]
        );
        Ok(())
    }

    #[test]
    fn test_class_weights_balance_classes() -> Result<()> {
        let dir = standard_tree()?;
        let indexed = DatasetIndexer::new(IndexerConfig::new(dir.path()))?.index()?;

        // 12 train records, 3 NORMAL and 9 PNEUMONIA.
        let weights = indexed.class_weights(Split::Train);
        assert!((weights[0] - 2.0).abs() < 1e-9);
        assert!((weights[1] - 12.0 / 18.0).abs() < 1e-9);

        let sample_weights = indexed.sample_weights(Split::Train);
        assert_eq!(sample_weights.len(), 12);
        let normal_mass: f64 = indexed
            .records(Split::Train)
            .iter()
            .zip(&sample_weights)
            .filter(|(r, _)| r.label == ClassName::Normal)
            .map(|(_, w)| w)
            .sum();
        assert!((normal_mass - 6.0).abs() < 1e-9, "each class gets half the mass");
        Ok(())
    }

    #[test]
    fn test_missing_val_allowed_only_when_resplitting() -> Result<()> {
        let dir = make_tree(&[
            ("train", "NORMAL", 8),
            ("train", "PNEUMONIA", 8),
            ("test", "NORMAL", 1),
            ("test", "PNEUMONIA", 1),
        ])?;

        let err = DatasetIndexer::new(IndexerConfig::new(dir.path()))?
            .index()
            .unwrap_err();
        assert!(matches!(DataError::find(&err), Some(DataError::Config { .. })));

        let indexed = DatasetIndexer::new(IndexerConfig::new(dir.path()).resplit(0.25))?.index()?;
        assert_eq!(indexed.len(Split::Val), 4);
        assert_eq!(indexed.len(Split::Train), 12);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_val_ratio() {
        assert!(DatasetIndexer::new(IndexerConfig::new("x").resplit(0.0)).is_err());
        assert!(DatasetIndexer::new(IndexerConfig::new("x").resplit(1.0)).is_err());
        assert!(DatasetIndexer::new(IndexerConfig::new("x").extensions::<&str>(&[])).is_err());
    }

    #[test]
    fn test_stray_files_in_split_dir_are_ignored() -> Result<()> {
        let dir = standard_tree()?;
        File::create(dir.path().join("train").join(".DS_Store"))?;
        File::create(dir.path().join("train").join("NORMAL").join("readme.txt"))?;

        let indexed = DatasetIndexer::new(IndexerConfig::new(dir.path()))?.index()?;
        assert_eq!(indexed.len(Split::Train), 12);
        Ok(())
    }
}
