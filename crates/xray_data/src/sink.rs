//! Where evaluation results go.
//!
//! The crate does not score models. An evaluation loop hands each
//! `(predicted, actual)` label pair to a [`ResultsSink`]; whatever aggregates
//! them (confusion matrix, precision/recall, a CSV writer) lives behind that
//! trait.

use crate::collator::Collator;
use crate::dataloader::DataLoader;
use crate::dataset::Dataset;
use crate::minibatch::MiniBatch;
use anyhow::{bail, ensure, Result};
use ndarray::{Array2, ArrayView1};
use std::path::PathBuf;
use tracing::debug;

/// Receives one prediction per evaluated record.
pub trait ResultsSink {
    fn record(&mut self, predicted: usize, actual: usize) -> Result<()>;

    /// Records the highest-scoring class. Ties go to the lower index.
    fn record_scores(&mut self, scores: ArrayView1<'_, f32>, actual: usize) -> Result<()> {
        let mut best: Option<(usize, f32)> = None;
        for (class, &score) in scores.iter().enumerate() {
            if score.is_nan() {
                bail!("NaN score for class {} (actual label {})", class, actual);
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((class, score));
            }
        }
        match best {
            Some((predicted, _)) => self.record(predicted, actual),
            None => bail!("Empty score vector for actual label {}", actual),
        }
    }
}

/// Keeps every `(predicted, actual)` pair in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionRecorder {
    pairs: Vec<(usize, usize)>,
}

impl PredictionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(usize, usize)> {
        self.pairs
    }
}

impl ResultsSink for PredictionRecorder {
    fn record(&mut self, predicted: usize, actual: usize) -> Result<()> {
        self.pairs.push((predicted, actual));
        Ok(())
    }
}

/// What one evaluation pass covered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalSummary {
    pub batches: usize,
    pub records: usize,
    /// Records dropped under `DecodeErrorPolicy::Skip`.
    pub skipped: Vec<PathBuf>,
}

/// Runs one pass of `loader` (epoch 0), scores each batch with `classify`
/// and records one prediction per record in `sink`.
///
/// `classify` returns a `[B, K]` score matrix for a batch of `B` images.
pub fn evaluate<D, C, F, S>(
    loader: &DataLoader<D, C>,
    mut classify: F,
    sink: &mut S,
) -> Result<EvalSummary>
where
    D: Dataset + 'static,
    C: Collator + Clone + Send + Sync + 'static,
    F: FnMut(&MiniBatch) -> Result<Array2<f32>>,
    S: ResultsSink + ?Sized,
{
    let mut summary = EvalSummary::default();
    let mut iter = loader.iter_epoch(0)?;
    for batch in iter.by_ref() {
        let batch = batch?;
        let scores = classify(&batch)?;
        ensure!(
            scores.nrows() == batch.batch_size(),
            "Classifier returned {} score rows for a batch of {}",
            scores.nrows(),
            batch.batch_size()
        );
        for (row, &actual) in scores.rows().into_iter().zip(&batch.labels) {
            sink.record_scores(row, actual)?;
        }
        summary.batches += 1;
        summary.records += batch.batch_size();
    }
    summary.skipped = iter.skipped().to_vec();
    debug!(
        batches = summary.batches,
        records = summary.records,
        skipped = summary.skipped.len(),
        "evaluation pass complete"
    );
    Ok(summary)
}
