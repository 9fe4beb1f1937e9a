//! Worker pool implementation for parallel image decoding.
//!
//! Manages worker lifecycle, task distribution and result collection for one
//! loader pass.
//!
//! # Key features
//! - Bounded channels prevent memory bloat
//! - Per-worker task channels: the caller decides which worker gets a task
//! - Graceful shutdown on drop, even while workers are mid-batch
//! - Thread-local worker IDs for log messages

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::dataloader::common::thread::WORKER_ID;

/// Thread pool for parallel data loading.
///
/// Manages worker lifecycle and communication through bounded channels:
/// - Task channels: Main thread -> one channel per worker
/// - Output channel: Workers -> Main thread (shared)
/// - Shutdown flag: Enables graceful termination
///
/// # Type Parameters
/// - `Task`: Work items sent to workers
/// - `Output`: Results returned from workers
pub(crate) struct WorkerPool<Task, Output> {
    workers: Vec<thread::JoinHandle<()>>,
    task_txs: Vec<Sender<Task>>,
    output_rx: Receiver<Output>,
    shutdown: Arc<AtomicBool>,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Spawns `num_workers` threads running `worker_fn`.
    ///
    /// Each task channel holds `buffer_size` tasks; the output channel holds
    /// `buffer_size * num_workers` results, so a caller that keeps at most that
    /// many tasks outstanding never blocks a worker on send.
    pub(crate) fn new<F>(num_workers: usize, buffer_size: usize, worker_fn: F) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        if num_workers == 0 {
            return Err(anyhow!(
                "Cannot create WorkerPool with 0 workers. \
                Either set num_workers > 0 or use single-threaded mode."
            ));
        }

        if buffer_size == 0 {
            return Err(anyhow!(
                "Cannot create WorkerPool with buffer_size 0. \
                Buffer size must be > 0 to prevent deadlocks."
            ));
        }

        let mut task_txs = Vec::with_capacity(num_workers);
        let mut task_rxs = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let (tx, rx) = bounded(buffer_size);
            task_txs.push(tx);
            task_rxs.push(rx);
        }
        let (output_tx, output_rx) = bounded(buffer_size * num_workers);

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);
        let mut workers = Vec::with_capacity(num_workers);

        for (worker_id, task_rx) in task_rxs.into_iter().enumerate() {
            let output_tx = output_tx.clone();
            let shutdown_clone = shutdown.clone();
            let worker_fn_clone = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("xray-loader-worker-{}", worker_id))
                .spawn(move || {
                    WORKER_ID.with(|id| *id.borrow_mut() = worker_id);
                    worker_fn_clone(task_rx, output_tx, shutdown_clone);
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;

            workers.push(handle);
        }

        Ok(Self {
            workers,
            task_txs,
            output_rx,
            shutdown,
        })
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.task_txs.len()
    }

    /// Sends a task to a specific worker, blocking while its queue is full.
    pub(crate) fn send_to(&self, worker_id: usize, task: Task) -> Result<()> {
        let tx = self
            .task_txs
            .get(worker_id)
            .ok_or_else(|| anyhow!("No worker with id {}", worker_id))?;
        tx.send(task)
            .map_err(|_| anyhow!("Worker {} channel closed - worker may have crashed", worker_id))
    }

    /// Receives the next result from any worker.
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<Output> {
        self.output_rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => anyhow!(
                "Worker timeout after {:?} - possible deadlock or slow image decoding",
                timeout
            ),
            RecvTimeoutError::Disconnected => {
                anyhow!("Worker channel disconnected - workers may have crashed")
            }
        })
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        // Signal shutdown to all workers
        self.shutdown.store(true, Ordering::Relaxed);

        // Closing the task channels wakes idle workers
        self.task_txs.clear();

        // Disconnect the output channel so no worker blocks on a send
        self.output_rx = crossbeam_channel::never();

        let num_workers = self.workers.len();
        for (worker_id, worker) in self.workers.drain(..).enumerate() {
            if worker.join().is_err() {
                warn!(worker_id, "loader worker panicked");
            }
        }
        debug!(num_workers, "worker pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn echo_pool(num_workers: usize) -> Result<WorkerPool<usize, (usize, usize)>> {
        WorkerPool::new(num_workers, 2, |task_rx: Receiver<usize>, output_tx: Sender<(usize, usize)>, shutdown: Arc<AtomicBool>| {
            let worker_id = WORKER_ID.with(|id| *id.borrow());
            while !shutdown.load(Ordering::Relaxed) {
                match task_rx.recv_timeout(Duration::from_millis(10)) {
                    Ok(task) => {
                        if output_tx.send((worker_id, task)).is_err() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
    }

    #[test]
    fn test_tasks_reach_the_chosen_worker() -> Result<()> {
        let pool = echo_pool(3)?;
        assert_eq!(pool.num_workers(), 3);

        for task in 0..6 {
            pool.send_to(task % 3, task)?;
        }
        let mut results: Vec<_> = (0..6)
            .map(|_| pool.recv_timeout(Duration::from_secs(5)))
            .collect::<Result<_>>()?;
        results.sort_by_key(|&(_, task)| task);

        for (worker_id, task) in results {
            assert_eq!(worker_id, task % 3);
        }
        assert!(pool.send_to(3, 0).is_err());
        Ok(())
    }

    #[test]
    fn test_rejects_empty_pool() {
        assert!(echo_pool(0).is_err());
    }

    #[test]
    fn test_drop_with_unread_output_returns() -> Result<()> {
        let pool = echo_pool(2)?;
        for task in 0..4 {
            pool.send_to(task % 2, task)?;
        }
        let start = Instant::now();
        drop(pool);
        assert!(start.elapsed() < Duration::from_secs(5));
        Ok(())
    }
}
