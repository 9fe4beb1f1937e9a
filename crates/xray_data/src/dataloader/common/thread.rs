//! Thread-local storage for worker identification and seeded randomness.
//!
//! Each worker thread records its ID for error messages, and holds an RNG
//! that is re-seeded for every batch it decodes. Seeding per batch (rather
//! than per worker) means a randomized transform draws the same numbers for
//! a given `(seed, epoch, batch)` regardless of how many workers run or which
//! one picks the batch up.

use rand::rngs::StdRng;
use rand::Rng as _;
use rand::SeedableRng;
use std::cell::RefCell;

/// Seed used when a transform draws randomness outside of a loader pass.
const FALLBACK_SEED: u64 = 0;

thread_local! {
    /// Thread-local worker ID (0 to num_workers-1; 0 on the main thread).
    pub static WORKER_ID: RefCell<usize> = const { RefCell::new(0) };

    /// Thread-local RNG for deterministic randomness in transforms.
    pub static WORKER_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// Derives the RNG seed for one batch of one pass.
/// Seed formula: base_seed + (epoch << 32) + batch_index
pub fn batch_seed(base_seed: u64, epoch: usize, batch_index: usize) -> u64 {
    base_seed
        .wrapping_add((epoch as u64) << 32)
        .wrapping_add(batch_index as u64)
}

/// Re-seeds the calling thread's RNG for the given batch.
pub fn init_batch_rng(base_seed: u64, epoch: usize, batch_index: usize) {
    WORKER_RNG.with(|rng| {
        *rng.borrow_mut() = Some(StdRng::seed_from_u64(batch_seed(
            base_seed,
            epoch,
            batch_index,
        )));
    })
}

/// Returns the ID of the calling worker thread.
pub fn current_worker_id() -> usize {
    WORKER_ID.with(|id| *id.borrow())
}

/// Get a random bool from the thread's RNG. Outside a loader pass the RNG is
/// lazily seeded with a fixed value, so results stay reproducible.
/// Used by transforms like RandomHorizontalFlip to ensure determinism.
pub fn worker_gen_bool(p: f64) -> bool {
    WORKER_RNG.with(|rng| {
        rng.borrow_mut()
            .get_or_insert_with(|| StdRng::seed_from_u64(FALLBACK_SEED))
            .random_bool(p)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draws(n: usize) -> Vec<bool> {
        (0..n).map(|_| worker_gen_bool(0.5)).collect()
    }

    #[test]
    fn test_same_batch_same_draws() {
        init_batch_rng(42, 1, 7);
        let first = draws(32);
        init_batch_rng(42, 1, 7);
        let second = draws(32);
        assert_eq!(first, second);
    }

    #[test]
    fn test_epoch_changes_draws() {
        init_batch_rng(42, 0, 0);
        let epoch0 = draws(64);
        init_batch_rng(42, 1, 0);
        let epoch1 = draws(64);
        assert_ne!(epoch0, epoch1);
    }

    #[test]
    fn test_batch_seed_layout() {
        assert_eq!(batch_seed(5, 0, 3), 8);
        assert_eq!(batch_seed(0, 1, 0), 1 << 32);
    }
}
