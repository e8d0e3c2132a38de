//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the export, restore and migration engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A required setting is absent. Raised before the store is touched.
    #[error("configuration missing: {what}")]
    ConfigurationMissing {
        /// Which setting is missing.
        what: String,
    },

    /// A setting is present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No user carries the configured SuperAdmin email.
    #[error("super admin not found: no user with email '{email}'")]
    RootNotFound {
        /// The configured SuperAdmin email.
        email: String,
    },

    /// A batch commit was rejected by the store.
    ///
    /// Batches committed before this one stay durable.
    #[error(
        "commit failed in {stage} (batch {batch}, starting at {first_ref}, \
         {committed_batches} batch(es) already committed): {reason}"
    )]
    CommitFailure {
        /// Stage label of the run, e.g. `migrate:pass2`.
        stage: String,
        /// 1-based ordinal of the failed batch, counted across every stage
        /// committed through the same writer.
        batch: usize,
        /// First document of the failed batch, as `collection/id`.
        first_ref: String,
        /// Batches committed before the failure.
        committed_batches: usize,
        /// Reason reported by the store.
        reason: String,
    },

    /// The caller-level deadline passed before the next commit.
    #[error("deadline exceeded in {stage} after {committed_batches} committed batch(es)")]
    DeadlineExceeded {
        /// Stage label of the run.
        stage: String,
        /// Batches committed before the deadline hit.
        committed_batches: usize,
    },

    /// The archive for a collection does not exist in the run directory.
    #[error("archive for '{collection}' not found at {}", .path.display())]
    ArchiveMissing {
        /// Collection name.
        collection: String,
        /// Expected archive path.
        path: PathBuf,
    },

    /// The archive exists but cannot be read or trusted.
    #[error("cannot read archive for '{collection}' at {}: {reason}", .path.display())]
    ArchiveReadFailure {
        /// Collection name.
        collection: String,
        /// Archive path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Build a [`Error::ConfigurationMissing`].
    pub fn missing(what: impl Into<String>) -> Self {
        Error::ConfigurationMissing { what: what.into() }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
