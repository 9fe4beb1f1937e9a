#![allow(dead_code)]

use anyhow::Result;
use image::{GrayImage, Luma};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use xray_data::DataConfig;

/// The layout used by most tests: 12 train (3/9), 2 val (1/1), 5 test (2/3).
pub const STANDARD_LAYOUT: &[(&str, &str, usize)] = &[
    ("train", "NORMAL", 3),
    ("train", "PNEUMONIA", 9),
    ("val", "NORMAL", 1),
    ("val", "PNEUMONIA", 1),
    ("test", "NORMAL", 2),
    ("test", "PNEUMONIA", 3),
];

/// Writes a small grayscale PNG. Sizes vary with `seed` so the resize step
/// has real work to do; the shade makes every image distinguishable.
pub fn write_png(path: &Path, seed: usize) -> Result<()> {
    let width = 10 + (seed % 4) as u32;
    let height = 9 + (seed % 3) as u32;
    let shade = (10 + seed * 7 % 240) as u8;
    let img = GrayImage::from_fn(width, height, |x, _| Luma([shade.saturating_add(x as u8)]));
    img.save(path)?;
    Ok(())
}

/// Builds `root/<split>/<class>/img_NNN.png` for every `(split, class, n)`.
pub fn build_tree(layout: &[(&str, &str, usize)]) -> Result<TempDir> {
    let dir = tempdir()?;
    let mut seed = 0;
    for &(split, class, n) in layout {
        let class_dir = dir.path().join(split).join(class);
        fs::create_dir_all(&class_dir)?;
        for i in 0..n {
            write_png(&class_dir.join(format!("img_{:03}.png", i)), seed)?;
            seed += 1;
        }
    }
    Ok(dir)
}

pub fn standard_tree() -> Result<TempDir> {
    build_tree(STANDARD_LAYOUT)
}

/// Overwrites (or creates) `path` with bytes no decoder accepts.
pub fn corrupt(path: &Path) -> Result<PathBuf> {
    fs::write(path, b"this is not an image")?;
    Ok(path.to_path_buf())
}

/// Tiny images so tests stay fast: resize to 8, crop to 6.
pub fn small_config(root: &Path) -> DataConfig {
    DataConfig {
        resize: 8,
        crop: 6,
        batch_size: 2,
        ..DataConfig::new(root)
    }
}
