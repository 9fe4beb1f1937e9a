//! Indexing tests over on-disk trees.
//!
//! Tests cover:
//! - Unknown class directories under the fail and ignore policies
//! - Structural errors: missing root, split or class, empty split
//! - Extension filtering and symlinked directories
//! - Coverage: the records are exactly the image files on disk
//! - Class-balanced train sampling

mod common;
use common::{build_tree, small_config, standard_tree, write_png};
use xray_data::{
    ClassName, DataConfig, DataError, DatasetIndexer, IndexerConfig, Split, Stage,
    UnknownClassPolicy, XrayDataModule,
};

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn is_config_error(err: &anyhow::Error) -> bool {
    matches!(DataError::find(err), Some(DataError::Config { .. }))
}

/// Every regular file under `root`, sorted.
fn files_on_disk(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

// ============================================================================
// 1. Unknown classes
// ============================================================================

#[test]
fn test_unknown_class_fails_by_default() -> Result<()> {
    let dir = standard_tree()?;
    let covid = dir.path().join("train/COVID");
    fs::create_dir_all(&covid)?;
    write_png(&covid.join("img_000.png"), 0)?;

    let err = DatasetIndexer::new(IndexerConfig::new(dir.path()))?
        .index()
        .unwrap_err();
    match DataError::find(&err) {
        Some(DataError::Label { name, path }) => {
            assert_eq!(name, "COVID");
            assert_eq!(path, &covid);
        }
        other => panic!("expected label error, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_unknown_class_ignored_when_asked() -> Result<()> {
    let dir = standard_tree()?;
    let covid = dir.path().join("train/COVID");
    fs::create_dir_all(&covid)?;
    write_png(&covid.join("img_000.png"), 0)?;

    let config = IndexerConfig::new(dir.path()).unknown_class_policy(UnknownClassPolicy::Ignore);
    let indexed = DatasetIndexer::new(config)?.index()?;
    assert_eq!(indexed.len(Split::Train), 12);
    assert_eq!(indexed.class_index().len(), 2);
    assert!(indexed
        .records(Split::Train)
        .iter()
        .all(|r| !r.path.starts_with(&covid)));
    Ok(())
}

// ============================================================================
// 2. Structural errors
// ============================================================================

#[test]
fn test_missing_root_is_config_error() -> Result<()> {
    let dir = standard_tree()?;
    let err = DatasetIndexer::new(IndexerConfig::new(dir.path().join("nope")))?
        .index()
        .unwrap_err();
    assert!(is_config_error(&err));
    Ok(())
}

#[test]
fn test_missing_test_split_is_config_error() -> Result<()> {
    let dir = build_tree(&[
        ("train", "NORMAL", 2),
        ("train", "PNEUMONIA", 2),
        ("val", "NORMAL", 1),
        ("val", "PNEUMONIA", 1),
    ])?;
    let err = DatasetIndexer::new(IndexerConfig::new(dir.path()))?
        .index()
        .unwrap_err();
    assert!(is_config_error(&err));
    Ok(())
}

#[test]
fn test_empty_split_is_config_error() -> Result<()> {
    let dir = build_tree(&[
        ("train", "NORMAL", 2),
        ("train", "PNEUMONIA", 2),
        ("val", "NORMAL", 1),
        ("val", "PNEUMONIA", 1),
        ("test", "NORMAL", 0),
        ("test", "PNEUMONIA", 0),
    ])?;
    let err = DatasetIndexer::new(IndexerConfig::new(dir.path()))?
        .index()
        .unwrap_err();
    assert!(is_config_error(&err));
    assert!(format!("{:#}", err).contains("test"));
    Ok(())
}

#[test]
fn test_class_missing_everywhere_is_config_error() -> Result<()> {
    let dir = build_tree(&[
        ("train", "PNEUMONIA", 2),
        ("val", "PNEUMONIA", 1),
        ("test", "PNEUMONIA", 1),
    ])?;
    let err = DatasetIndexer::new(IndexerConfig::new(dir.path()))?
        .index()
        .unwrap_err();
    assert!(is_config_error(&err));
    assert!(format!("{:#}", err).contains("NORMAL"));
    Ok(())
}

// ============================================================================
// 3. Filtering
// ============================================================================

#[test]
fn test_non_image_files_are_not_indexed() -> Result<()> {
    let dir = standard_tree()?;
    fs::write(dir.path().join("test/NORMAL/notes.txt"), "radiologist notes")?;
    fs::write(dir.path().join("test/PNEUMONIA/.DS_Store"), [0u8; 4])?;

    let indexed = DatasetIndexer::new(IndexerConfig::new(dir.path()))?.index()?;
    assert_eq!(indexed.len(Split::Test), 5);
    assert_eq!(indexed.label_counts().get(Split::Test, ClassName::Normal), 2);

    // Restricting extensions drops everything when no file matches
    let only_jpeg = IndexerConfig::new(dir.path()).extensions(&["jpeg"]);
    let err = DatasetIndexer::new(only_jpeg)?.index().unwrap_err();
    assert!(is_config_error(&err));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_symlinked_class_dir_is_skipped() -> Result<()> {
    let dir = standard_tree()?;
    std::os::unix::fs::symlink(
        dir.path().join("train/NORMAL"),
        dir.path().join("train/EXTRA"),
    )?;

    // Not followed, so neither indexed nor rejected as an unknown class
    let indexed = DatasetIndexer::new(IndexerConfig::new(dir.path()))?.index()?;
    assert_eq!(indexed.len(Split::Train), 12);
    assert!(indexed
        .records(Split::Train)
        .iter()
        .all(|r| !r.path.starts_with(dir.path().join("train/EXTRA"))));
    Ok(())
}

// ============================================================================
// 4. Coverage
// ============================================================================

#[test]
fn test_records_are_exactly_the_files_on_disk() -> Result<()> {
    let dir = standard_tree()?;
    let expected = files_on_disk(dir.path())?;
    assert_eq!(expected.len(), 19);

    for config in [
        IndexerConfig::new(dir.path()),
        IndexerConfig::new(dir.path()).resplit(0.25).seed(3),
    ] {
        let indexed = DatasetIndexer::new(config)?.index()?;
        let mut union: Vec<PathBuf> = Split::ALL
            .iter()
            .flat_map(|&split| indexed.records(split).iter().map(|r| r.path.clone()))
            .collect();
        union.sort();
        assert_eq!(union, expected, "no record missing, none duplicated");
        assert_eq!(indexed.total(), expected.len());
    }
    Ok(())
}

// ============================================================================
// 5. Class balancing
// ============================================================================

#[test]
fn test_balanced_train_sampling_evens_out_classes() -> Result<()> {
    // 3 NORMAL vs 9 PNEUMONIA in train
    let dir = standard_tree()?;
    let mut module = XrayDataModule::new(DataConfig {
        balance_classes: true,
        ..small_config(dir.path())
    })?;
    module.setup(Stage::Fit)?;

    let loader = module.train_dataloader()?;
    let mut normal = 0;
    let mut total = 0;
    for _ in 0..20 {
        for batch in loader.iter()? {
            let batch = batch?;
            normal += batch.labels.iter().filter(|&&l| l == 0).count();
            total += batch.batch_size();
        }
    }
    assert_eq!(total, 240);
    // Unweighted sampling would give 25% NORMAL
    let share = normal as f64 / total as f64;
    assert!((0.35..0.65).contains(&share), "NORMAL share {}", share);
    Ok(())
}
