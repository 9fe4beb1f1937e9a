//! src/dataloader/common/mod.rs
//!
//! Utilities shared by the single-threaded and worker-pool iterators.

pub mod thread;
