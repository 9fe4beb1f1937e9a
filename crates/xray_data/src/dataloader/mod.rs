//! src/dataloader/mod.rs
//!
//! This module implements the `DataLoader`.
//!
//! The `DataLoader` coordinates a `Dataset`, a `Sampler` and a `Collator` to
//! turn one split's records into batches, either on the calling thread or
//! with a pool of worker threads.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌─────────┐
//!                    │ Dataset │ (records of one split)
//!                    └────┬────┘
//!                         │ record index → path
//!                         ↓
//!                  ┌──────────────┐
//!                  │  Transform   │ (decode → resize → crop → normalize)
//!                  └──────┬───────┘
//!                         │ Sample
//!                         ↓
//!                    ┌─────────┐
//!                    │ Sampler │ (visiting order per epoch)
//!                    └────┬────┘
//!                         │ batches of indices
//!                         ↓
//!                  ┌──────────────┐
//!                  │  DataLoader  │ ←───── Config (batch_size, workers, etc.)
//!                  └──────┬───────┘
//!                         │
//!                   [Worker Threads] (optional, re-ordered by position)
//!                         │
//!                         ↓
//!                    ┌──────────┐
//!                    │ Collator │ (stacks samples)
//!                    └────┬─────┘
//!                         ↓
//!                   ┌───────────┐
//!                   │ MiniBatch │ [B, 3, H, W] + labels + paths
//!                   └───────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dataloader/
//! ├── mod.rs             # Public API exports + module-level architecture docs
//! ├── config.rs          # DataLoaderConfig, builder, validation, DecodeErrorPolicy
//! ├── loader.rs          # DataLoader struct, constructors, iter/iter_epoch
//! ├── iterator/
//! │   └── mod.rs         # DataLoaderIter: single-threaded and worker-backed passes
//! ├── workers/
//! │   ├── mod.rs         # Batch task protocol and load_batch
//! │   └── pool.rs        # Generic `WorkerPool<Task, Output>`
//! └── common/
//!     ├── mod.rs
//!     └── thread.rs      # Thread-local worker ID and per-batch RNG
//! ```
//!
//! # Example Usage
//!
//! ## Single-threaded
//! ```ignore
//! let config = DataLoaderConfig::builder().batch_size(32).build();
//! let dataloader = DataLoader::new(dataset, config)?;
//!
//! for batch in dataloader.iter()? {
//!     let batch: MiniBatch = batch?;
//!     // batch.images: [B, 3, 224, 224]
//! }
//! ```
//!
//! ## Multi-threaded
//! ```ignore
//! let config = DataLoaderConfig::builder()
//!     .batch_size(32)
//!     .num_workers(4)
//!     .prefetch_factor(2)
//!     .shuffle(true)
//!     .build();
//! ```
//!
//! # Memory Usage
//! - Single-threaded: O(batch_size)
//! - Multi-threaded: O(num_workers x prefetch_factor x batch_size)

mod common;
mod config;
mod iterator;
mod loader;
mod workers;

pub use config::{DataLoaderConfig, DataLoaderConfigBuilder, DecodeErrorPolicy};
pub use iterator::DataLoaderIter;
pub use loader::DataLoader;

pub use common::thread::{
    batch_seed, current_worker_id, init_batch_rng, worker_gen_bool, WORKER_ID, WORKER_RNG,
};
