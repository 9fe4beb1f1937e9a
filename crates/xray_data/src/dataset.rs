use crate::error::DataError;
use crate::label::ClassIndex;
use crate::record::{Record, Split};
use crate::sample::Sample;
use crate::transforms::Transform;
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// A `Dataset` provides random access to the decoded samples of one split.
///
/// Implementations must be `Send + Sync` so worker threads can share one
/// instance behind an `Arc`.
pub trait Dataset: Send + Sync {
    /// Decodes the sample at `index`.
    ///
    /// Errors caused by the record's file (missing, unreadable, corrupt) are
    /// reported as [`DataError::Decode`] naming the path.
    fn get_sample(&self, index: usize) -> Result<Sample>;

    /// The undecoded record at `index`, if in bounds.
    fn record(&self, index: usize) -> Option<&Record>;

    /// Returns total number of records.
    fn len(&self) -> usize;

    /// Checks if the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The records of one split plus the transform that decodes them.
///
/// Records live in an atomically reference-counted slice (`Arc<[Record]>`):
/// - Zero-copy clone: cloning only bumps the `Arc` counters
/// - Read-only sharing: workers borrow the list, nobody mutates it
///
/// The `ClassIndex` is shared the same way and maps each record's
/// `ClassName` to the integer label stored in the sample.
#[derive(Debug)]
pub struct SplitDataset<T> {
    split: Split,
    records: Arc<[Record]>,
    class_index: Arc<ClassIndex>,
    transform: Arc<T>,
}

impl<T> Clone for SplitDataset<T> {
    fn clone(&self) -> Self {
        Self {
            split: self.split,
            records: Arc::clone(&self.records),
            class_index: Arc::clone(&self.class_index),
            transform: Arc::clone(&self.transform),
        }
    }
}

impl<T> SplitDataset<T>
where
    T: Transform<(PathBuf, usize), Sample>,
{
    /// Creates a dataset for `split`. Every record's class must be present
    /// in `class_index`.
    pub fn new(
        split: Split,
        records: impl Into<Arc<[Record]>>,
        class_index: Arc<ClassIndex>,
        transform: T,
    ) -> Result<Self> {
        let records = records.into();
        if let Some(orphan) = records
            .iter()
            .find(|r| class_index.index_of(r.label).is_none())
        {
            return Err(anyhow!(DataError::Label {
                name: orphan.label.to_string(),
                path: orphan.path.clone(),
            }));
        }
        Ok(Self {
            split,
            records,
            class_index,
            transform: Arc::new(transform),
        })
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn class_index(&self) -> &ClassIndex {
        &self.class_index
    }
}

impl<T> Dataset for SplitDataset<T>
where
    T: Transform<(PathBuf, usize), Sample>,
{
    fn get_sample(&self, index: usize) -> Result<Sample> {
        let record = self.records.get(index).ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds for {} split of {} records",
                index,
                self.split,
                self.records.len()
            )
        })?;
        // Checked for every record in `new`.
        let label = self
            .class_index
            .index_of(record.label)
            .ok_or_else(|| anyhow!("Class {} missing from class index", record.label))?;

        self.transform
            .apply((record.path.clone(), label))
            .map_err(|e| anyhow!(DataError::decode(&record.path, &e)))
    }

    fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
