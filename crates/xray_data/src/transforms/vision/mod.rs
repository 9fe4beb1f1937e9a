//! src/transforms/vision/mod.rs
//!
//! Vision transforms for X-ray preprocessing.
//!
//! # Module Organization
//!
//! ```text
//! transforms/vision/
//! ├── geometric.rs     → Spatial transformations (RGB, resize, center crop)
//! ├── photometric.rs   → Channel normalization
//! ├── conversion.rs    → Image → CHW tensor
//! ├── augmentation.rs  → Seeded random flip
//! ├── pipeline.rs      → The fixed train/eval pipeline and its config
//! └── io.rs            → Image loading
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use crate::transforms::vision::{LoadImageToSample, TransformConfig, XrayTransform};
//!
//! let pipeline = XrayTransform::new(&TransformConfig::default(), false)?;
//! let to_sample = LoadImageToSample::new(pipeline);
//! ```

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod io;
pub mod photometric;
pub mod pipeline;

pub use augmentation::RandomHorizontalFlip;
pub use conversion::ToTensor;
pub use geometric::{CenterCrop, EnsureRGB, Resize};
pub use io::{LoadImage, LoadImageToSample};
pub use photometric::Normalize;
pub use pipeline::{TransformConfig, XrayTransform};
