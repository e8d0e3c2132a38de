//! Batched write executor.
//!
//! Writes are accumulated and committed in chunks of at most `max_batch_size`
//! operations. Every chunk is atomic at the store level; there is no atomicity
//! across chunks, so a failure after N commits leaves those N durable.

use std::time::Instant;

use crate::error::{Error, Result};
use crate::store::{DocumentStore, PendingWrite};

/// Default batch size, kept below the 500-write commit ceiling.
pub const DEFAULT_BATCH_SIZE: usize = 400;

/// Check that `max_batch_size` is within `1..=` the store's commit ceiling.
pub fn check_batch_size<S>(store: &S, max_batch_size: usize) -> Result<()>
where
    S: DocumentStore + ?Sized,
{
    let ceiling = store.max_batch_operations();
    if max_batch_size == 0 || max_batch_size > ceiling {
        return Err(Error::InvalidConfiguration(format!(
            "batch size {} must be between 1 and the store ceiling {}",
            max_batch_size, ceiling
        )));
    }
    Ok(())
}

/// Counters for the commits issued by a [`BatchWriter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Number of batch commits issued.
    pub commits: usize,
    /// Number of write operations committed.
    pub operations: usize,
}

/// Accumulates pending writes and commits them in bounded atomic batches.
///
/// One writer belongs to one run; it is not shared.
pub struct BatchWriter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    max_batch_size: usize,
    pending: Vec<PendingWrite>,
    stage: String,
    deadline: Option<Instant>,
    stats: WriteStats,
}

impl<'a, S: DocumentStore + ?Sized> BatchWriter<'a, S> {
    /// Create a writer committing at most `max_batch_size` writes per batch.
    ///
    /// Fails when the size is zero or above the store's commit ceiling.
    pub fn new(store: &'a S, max_batch_size: usize) -> Result<Self> {
        check_batch_size(store, max_batch_size)?;
        Ok(Self {
            store,
            max_batch_size,
            pending: Vec::with_capacity(max_batch_size),
            stage: String::from("write"),
            deadline: None,
            stats: WriteStats::default(),
        })
    }

    /// Stop committing once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Label used in logs and errors for the commits that follow.
    pub fn set_stage(&mut self, stage: impl Into<String>) {
        self.stage = stage.into();
    }

    /// Append a write, committing the batch if it is now full.
    pub fn enqueue(&mut self, write: PendingWrite) -> Result<()> {
        self.pending.push(write);
        self.flush_if_full()?;
        Ok(())
    }

    /// Commit the current batch if it has reached the batch size.
    ///
    /// Returns whether a commit happened.
    pub fn flush_if_full(&mut self) -> Result<bool> {
        if self.pending.len() >= self.max_batch_size {
            self.commit()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Commit whatever is pending. Called once at the end of a run.
    pub fn flush(&mut self) -> Result<WriteStats> {
        if !self.pending.is_empty() {
            self.commit()?;
        }
        Ok(self.stats)
    }

    /// Number of writes waiting for the next commit.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                tracing::warn!(
                    stage = %self.stage,
                    committed_batches = self.stats.commits,
                    dropped = self.pending.len(),
                    "deadline exceeded, no further batches will be committed"
                );
                return Err(Error::DeadlineExceeded {
                    stage: self.stage.clone(),
                    committed_batches: self.stats.commits,
                });
            }
        }

        let batch = std::mem::take(&mut self.pending);
        let ordinal = self.stats.commits + 1;

        if let Err(e) = self.store.batch_commit(&batch) {
            let first_ref = batch
                .first()
                .map(|w| w.target.to_string())
                .unwrap_or_default();
            tracing::error!(
                stage = %self.stage,
                batch = ordinal,
                first_ref = %first_ref,
                error = %e,
                "batch commit failed"
            );
            return Err(Error::CommitFailure {
                stage: self.stage.clone(),
                batch: ordinal,
                first_ref,
                committed_batches: self.stats.commits,
                reason: e.to_string(),
            });
        }

        self.stats.commits = ordinal;
        self.stats.operations += batch.len();
        tracing::debug!(
            stage = %self.stage,
            batch = ordinal,
            size = batch.len(),
            "batch committed"
        );
        Ok(())
    }
}
