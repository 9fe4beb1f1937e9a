//! Worker management for parallel data loading.
//!
//! - `pool`: generic worker pool with per-worker task channels
//! - this module: the batch task protocol and the decode-and-collate step
//!   shared by worker threads and the single-threaded iterator
//!
//! Each task carries its batch position. Workers re-seed their thread-local
//! RNG from `(seed, epoch, position)` before decoding, and tag the result with
//! the position so the iterator can restore sampler order.

pub(crate) mod pool;

use crate::collator::Collator;
use crate::dataset::Dataset;
use crate::error::DataError;
use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::warn;

use super::common::thread::{current_worker_id, init_batch_rng};
use super::config::{DataLoaderConfig, DecodeErrorPolicy};
use pool::WorkerPool;

/// One batch of record indices at a given position in the pass.
#[derive(Debug)]
pub(crate) struct BatchTask {
    pub(crate) batch_index: usize,
    pub(crate) indices: Vec<usize>,
}

/// A worker's answer to a [`BatchTask`].
pub(crate) struct BatchResult {
    pub(crate) batch_index: usize,
    pub(crate) outcome: Result<BatchOutcome>,
}

/// A decoded batch plus the records the skip policy dropped from it.
/// `batch` is `None` when every record failed.
#[derive(Debug)]
pub(crate) struct BatchOutcome {
    pub(crate) batch: Option<MiniBatch>,
    pub(crate) skipped: Vec<PathBuf>,
}

/// Per-pass parameters every batch is loaded with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassContext {
    pub(crate) seed: u64,
    pub(crate) epoch: usize,
    pub(crate) policy: DecodeErrorPolicy,
}

/// Decodes the records at `indices` and collates them into a batch.
///
/// Under `Abort` the first failing record fails the batch. Under `Skip`,
/// records that fail to decode are logged and dropped; any other error
/// still fails the batch.
pub(crate) fn load_batch<D, C>(
    dataset: &D,
    collator: &C,
    indices: &[usize],
    batch_index: usize,
    pass: PassContext,
) -> Result<BatchOutcome>
where
    D: Dataset + ?Sized,
    C: Collator,
{
    init_batch_rng(pass.seed, pass.epoch, batch_index);

    let mut samples = Vec::with_capacity(indices.len());
    let mut skipped = Vec::new();
    for &index in indices {
        match decode_record(dataset, index) {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                let decode_path = match DataError::find(&e) {
                    Some(DataError::Decode { path, .. }) => Some(path.clone()),
                    _ => None,
                };
                match (pass.policy, decode_path) {
                    (DecodeErrorPolicy::Skip, Some(path)) => {
                        warn!(path = %path.display(), error = %format!("{:#}", e), "skipping undecodable record");
                        skipped.push(path);
                    }
                    _ => {
                        return Err(e.context(format!(
                            "Failed to load sample {} of batch {}",
                            index, batch_index
                        )))
                    }
                }
            }
        }
    }

    let batch = if samples.is_empty() {
        None
    } else {
        Some(
            collator
                .collate(&samples)
                .with_context(|| format!("Failed to collate batch {}", batch_index))?,
        )
    };
    Ok(BatchOutcome { batch, skipped })
}

/// Decodes one record. A panic while decoding becomes a `DataError::Decode`
/// for that record, so the pass reports the file instead of stalling until
/// the receive timeout.
fn decode_record<D>(dataset: &D, index: usize) -> Result<Sample>
where
    D: Dataset + ?Sized,
{
    let payload = match panic::catch_unwind(AssertUnwindSafe(|| dataset.get_sample(index))) {
        Ok(result) => return result,
        Err(payload) => payload,
    };
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    let cause = anyhow!("decoder panicked: {}", message);
    match dataset.record(index) {
        Some(record) => Err(anyhow!(DataError::decode(&record.path, &cause))),
        None => Err(cause.context(format!("Failed to load sample {}", index))),
    }
}

/// Starts the worker threads for one pass.
///
/// Every worker owns a clone of the dataset handle and collator, pulls tasks
/// from its own channel and sends back position-tagged results until the
/// channel closes or shutdown is signalled.
pub(crate) fn spawn_batch_workers<D, C>(
    dataset: Arc<D>,
    collator: C,
    config: &DataLoaderConfig,
    pass: PassContext,
) -> Result<WorkerPool<BatchTask, BatchResult>>
where
    D: Dataset + ?Sized + 'static,
    C: Collator + Clone + Send + Sync + 'static,
{
    let worker_timeout = config.worker_timeout;

    WorkerPool::new(
        config.num_workers,
        config.prefetch_factor,
        move |task_rx: Receiver<BatchTask>, output_tx: Sender<BatchResult>, shutdown| {
            let worker_id = current_worker_id();

            while !shutdown.load(Ordering::Relaxed) {
                match task_rx.recv_timeout(worker_timeout) {
                    Ok(BatchTask {
                        batch_index,
                        indices,
                    }) => {
                        let outcome =
                            load_batch(dataset.as_ref(), &collator, &indices, batch_index, pass)
                                .with_context(|| {
                                    format!("Worker {} failed on batch {}", worker_id, batch_index)
                                });
                        let result = BatchResult {
                            batch_index,
                            outcome,
                        };
                        if output_tx.send(result).is_err() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        },
    )
    .context("Failed to start loader workers")
}
