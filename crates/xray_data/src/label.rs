//! Class labels and the name → index mapping.
//!
//! Labels come from directory names only. The set of classes is closed:
//! any directory that does not parse into a [`ClassName`] is either an error
//! or ignored, depending on the indexer's `UnknownClassPolicy`.

use crate::error::DataError;
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The closed set of diagnostic classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClassName {
    Normal,
    Pneumonia,
}

impl ClassName {
    pub const ALL: [ClassName; 2] = [ClassName::Normal, ClassName::Pneumonia];

    /// Directory name used on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassName::Normal => "NORMAL",
            ClassName::Pneumonia => "PNEUMONIA",
        }
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NORMAL" => Ok(ClassName::Normal),
            "PNEUMONIA" => Ok(ClassName::Pneumonia),
            other => Err(anyhow::anyhow!("Unknown class name '{}'", other)),
        }
    }
}

/// Bijective mapping from class name to a dense index `0..K-1`.
///
/// Built once from the discovered class directories. Names are sorted by
/// their directory name so the same set of classes always yields the same
/// indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex {
    classes: Vec<ClassName>,
}

impl ClassIndex {
    /// Builds the index from discovered names. Duplicates are collapsed.
    pub fn new(discovered: impl IntoIterator<Item = ClassName>) -> Result<Self> {
        let mut classes: Vec<ClassName> = discovered.into_iter().collect();
        classes.sort_by_key(|c| c.as_str());
        classes.dedup();
        ensure!(
            !classes.is_empty(),
            DataError::config("no class subdirectories were found")
        );
        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn index_of(&self, class: ClassName) -> Option<usize> {
        self.classes.iter().position(|&c| c == class)
    }

    pub fn class_of(&self, index: usize) -> Option<ClassName> {
        self.classes.get(index).copied()
    }

    /// Classes in index order.
    pub fn classes(&self) -> &[ClassName] {
        &self.classes
    }

    /// The `class_to_idx` dictionary keyed by directory name.
    pub fn to_map(&self) -> BTreeMap<String, usize> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str().to_string(), i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_round_trip() -> Result<()> {
        for class in ClassName::ALL {
            assert_eq!(class.as_str().parse::<ClassName>()?, class);
        }
        assert!("normal".parse::<ClassName>().is_err());
        assert!("COVID".parse::<ClassName>().is_err());
        Ok(())
    }

    #[test]
    fn test_class_index_is_sorted_bijection() -> Result<()> {
        let index = ClassIndex::new([ClassName::Pneumonia, ClassName::Normal, ClassName::Normal])?;
        assert_eq!(index.len(), 2);
        assert_eq!(index.index_of(ClassName::Normal), Some(0));
        assert_eq!(index.index_of(ClassName::Pneumonia), Some(1));

        for i in 0..index.len() {
            let class = index.class_of(i).unwrap();
            assert_eq!(index.index_of(class), Some(i));
        }
        assert!(index.class_of(2).is_none());

        let map = index.to_map();
        assert_eq!(map.get("NORMAL"), Some(&0));
        assert_eq!(map.get("PNEUMONIA"), Some(&1));
        Ok(())
    }

    #[test]
    fn test_class_index_single_class() -> Result<()> {
        let index = ClassIndex::new([ClassName::Pneumonia])?;
        assert_eq!(index.index_of(ClassName::Pneumonia), Some(0));
        assert_eq!(index.index_of(ClassName::Normal), None);
        Ok(())
    }

    #[test]
    fn test_class_index_rejects_empty() {
        assert!(ClassIndex::new([]).is_err());
    }
}
