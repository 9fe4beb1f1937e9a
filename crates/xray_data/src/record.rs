use crate::label::ClassName;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One of the three dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    /// Directory name used on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "val" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(anyhow!(
                "Unknown split '{}' (expected one of: train, val, test)",
                other
            )),
        }
    }
}

/// A single labeled image on disk.
///
/// Records are produced by the indexer from the directory layout alone; the
/// file is not opened until the loader decodes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Record {
    pub path: PathBuf,
    pub label: ClassName,
}

impl Record {
    pub fn new(path: impl Into<PathBuf>, label: ClassName) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_parse() -> Result<()> {
        for split in Split::ALL {
            assert_eq!(split.as_str().parse::<Split>()?, split);
        }
        assert!("validation".parse::<Split>().is_err());
        Ok(())
    }
}
