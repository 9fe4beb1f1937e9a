//! src/dataloader/iterator/mod.rs
//!
//! Iterator implementation for DataLoader.
//!
//! This module bridges the dataset, the batch sampler and the workers to
//! produce the batches of one pass. The main types are:
//!
//! - `DataLoaderIter`: The public iterator type returned by `DataLoader::iter()`
//! - `IteratorImpl`: Internal enum with one variant per threading mode
//!
//! # Iterator Variants
//! - `Single`: batches are decoded on the calling thread
//! - `Multi`: batches are decoded by a worker pool started for this pass and
//!   re-ordered by position before being yielded
//! - `Finished`: the pass is over (exhausted, or aborted by an error); the
//!   worker pool, if any, has been dropped and joined
//!
//! # Ordering
//! In `Multi` mode batch `i` is sent to worker `i % num_workers` and results
//! come back tagged with `i`. Out-of-order results wait in a reorder buffer,
//! so the sequence of batches is the same as in `Single` mode. At most
//! `num_workers * prefetch_factor` batches are outstanding (sent but not yet
//! yielded) at any time, which bounds both the task queues and the buffer.

use crate::collator::Collator;
use crate::dataset::Dataset;
use crate::minibatch::MiniBatch;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::iter::FusedIterator;
use std::path::PathBuf;
use std::time::Duration;

use super::workers::pool::WorkerPool;
use super::workers::{load_batch, BatchOutcome, BatchResult, BatchTask, PassContext};

/// Iterator over the batches of one pass.
///
/// Created by calling `dataloader.iter()` or `dataloader.iter_epoch(epoch)`.
/// Dropping it mid-pass shuts down and joins any workers.
pub struct DataLoaderIter<'a, D: ?Sized, C> {
    inner: IteratorImpl<'a, D, C>,
    pass: PassContext,
    skipped: Vec<PathBuf>,
}

/// Internal iterator implementation variants.
pub(crate) enum IteratorImpl<'a, D: ?Sized, C> {
    /// Single-threaded iteration.
    /// - `batch_index`: position of the next batch, used to seed its RNG
    Single {
        dataset: &'a D,
        collator: &'a C,
        batch_indices: Box<dyn Iterator<Item = Vec<usize>> + Send + 'a>,
        batch_index: usize,
    },

    /// Multi-threaded iteration with a worker pool owned by this pass.
    /// - `next_to_send`: position of the next batch to hand to a worker
    /// - `next_to_yield`: position of the next batch the caller receives
    /// - `reorder`: results that arrived ahead of `next_to_yield`
    Multi {
        pool: WorkerPool<BatchTask, BatchResult>,
        batch_indices: Box<dyn Iterator<Item = Vec<usize>> + Send + 'a>,
        max_in_flight: usize,
        timeout: Duration,
        next_to_send: usize,
        next_to_yield: usize,
        reorder: BTreeMap<usize, Result<BatchOutcome>>,
    },

    Finished,
}

impl<'a, D: ?Sized, C> DataLoaderIter<'a, D, C> {
    pub(crate) fn new(inner: IteratorImpl<'a, D, C>, pass: PassContext) -> Self {
        Self {
            inner,
            pass,
            skipped: Vec::new(),
        }
    }

    /// The epoch this pass was started with.
    pub fn epoch(&self) -> usize {
        self.pass.epoch
    }

    /// Paths dropped so far under `DecodeErrorPolicy::Skip`, in the order
    /// their batches were yielded.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }
}

impl<'a, D, C> IteratorImpl<'a, D, C>
where
    D: Dataset + ?Sized,
    C: Collator,
{
    /// Produces the outcome of the next batch position, or `None` at the end
    /// of the pass.
    fn next_outcome(&mut self, pass: PassContext) -> Option<Result<BatchOutcome>> {
        match self {
            IteratorImpl::Single {
                dataset,
                collator,
                batch_indices,
                batch_index,
            } => {
                let indices = batch_indices.next()?;
                let outcome = load_batch(*dataset, *collator, &indices, *batch_index, pass);
                *batch_index += 1;
                Some(outcome)
            }

            IteratorImpl::Multi {
                pool,
                batch_indices,
                max_in_flight,
                timeout,
                next_to_send,
                next_to_yield,
                reorder,
            } => {
                // Keep the pipeline full
                while *next_to_send - *next_to_yield < *max_in_flight {
                    let Some(indices) = batch_indices.next() else {
                        break;
                    };
                    let worker_id = *next_to_send % pool.num_workers();
                    let task = BatchTask {
                        batch_index: *next_to_send,
                        indices,
                    };
                    if let Err(e) = pool.send_to(worker_id, task) {
                        return Some(Err(e.context(format!(
                            "Failed to send batch {} to worker {}",
                            *next_to_send, worker_id
                        ))));
                    }
                    *next_to_send += 1;
                }

                if *next_to_yield == *next_to_send {
                    return None;
                }

                loop {
                    if let Some(outcome) = reorder.remove(&*next_to_yield) {
                        *next_to_yield += 1;
                        return Some(outcome);
                    }
                    match pool.recv_timeout(*timeout) {
                        Ok(BatchResult {
                            batch_index,
                            outcome,
                        }) => {
                            reorder.insert(batch_index, outcome);
                        }
                        Err(e) => {
                            return Some(Err(e.context(format!(
                                "Failed to receive batch {} (outstanding: {})",
                                *next_to_yield,
                                *next_to_send - *next_to_yield
                            ))))
                        }
                    }
                }
            }

            IteratorImpl::Finished => None,
        }
    }
}

impl<'a, D, C> Iterator for DataLoaderIter<'a, D, C>
where
    D: Dataset + ?Sized,
    C: Collator,
{
    type Item = Result<MiniBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next_outcome(self.pass) {
                Some(Ok(BatchOutcome { batch, skipped })) => {
                    self.skipped.extend(skipped);
                    match batch {
                        Some(batch) => return Some(Ok(batch)),
                        // Every record of this batch was skipped
                        None => continue,
                    }
                }
                Some(Err(e)) => {
                    // Ends the pass; dropping a pool joins its workers
                    self.inner = IteratorImpl::Finished;
                    let epoch = self.pass.epoch;
                    return Some(Err(e.context(format!("Pass for epoch {} aborted", epoch))));
                }
                None => {
                    self.inner = IteratorImpl::Finished;
                    return None;
                }
            }
        }
    }
}

impl<'a, D, C> FusedIterator for DataLoaderIter<'a, D, C>
where
    D: Dataset + ?Sized,
    C: Collator,
{
}
