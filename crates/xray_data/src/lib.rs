pub mod collator;
pub mod config;
pub mod dataloader;
pub mod datamodule;
pub mod dataset;
pub mod error;
pub mod indexer;
pub mod label;
pub mod minibatch;
pub mod readers;
pub mod record;
pub mod sample;
pub mod sampler;
pub mod sink;
pub mod transforms;

pub use collator::StackCollator;
pub use config::DataConfig;
pub use dataloader::{DataLoader, DataLoaderConfig, DecodeErrorPolicy};
pub use datamodule::{Stage, XrayDataModule};
pub use error::DataError;
pub use indexer::{DatasetIndexer, IndexedDataset, IndexerConfig, UnknownClassPolicy};
pub use label::{ClassIndex, ClassName};
pub use minibatch::MiniBatch;
pub use record::{Record, Split};
pub use sample::Sample;
