//! Archive restorer.
//!
//! Every archived document is written back with overwrite semantics under its
//! original id, so restoring the same archive twice converges to the same
//! state. Dry runs compute the counts without enqueueing anything.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use super::codec::{self, Archive};
use super::manifest::{checksum, RunManifest};
use super::export::DEFAULT_COLLECTIONS;
use crate::error::{Error, Result};
use crate::store::{DocRef, DocumentStore, PendingWrite};
use crate::writer::{check_batch_size, BatchWriter, WriteStats, DEFAULT_BATCH_SIZE};

/// Restore configuration.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    /// Collections to restore, in order.
    pub collections: Vec<String>,
    /// Compute counts only. On by default; live writes are an explicit opt-in.
    pub dry_run: bool,
    /// Writes per batch commit.
    pub batch_size: usize,
    /// Stop committing after this instant.
    pub deadline: Option<Instant>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            collections: DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
            dry_run: true,
            batch_size: DEFAULT_BATCH_SIZE,
            deadline: None,
        }
    }
}

impl RestoreConfig {
    /// Replace the collection list.
    pub fn with_collections<I, C>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.collections = collections.into_iter().map(Into::into).collect();
        self
    }

    /// Switch between dry run and live writes.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the run deadline.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// What happened to one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Documents were written.
    Restored,
    /// Dry run: documents were counted but not written.
    DryRun,
    /// No archive file for the collection.
    Missing,
    /// The archive could not be read or failed verification.
    Failed(String),
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreOutcome::Restored => write!(f, "restored"),
            RestoreOutcome::DryRun => write!(f, "dry run"),
            RestoreOutcome::Missing => write!(f, "missing"),
            RestoreOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Result for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRestore {
    /// Collection name.
    pub collection: String,
    /// Documents restored, or that would be restored in a dry run.
    pub documents: usize,
    /// Outcome.
    pub outcome: RestoreOutcome,
}

/// Result of a restore run.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Per-collection results, in request order.
    pub collections: Vec<CollectionRestore>,
    /// Commits issued across all collections.
    pub writes: WriteStats,
}

impl RestoreReport {
    /// Document count per collection.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.collections
            .iter()
            .map(|c| (c.collection.clone(), c.documents))
            .collect()
    }

    /// Collections whose archive failed to load.
    pub fn failures(&self) -> impl Iterator<Item = &CollectionRestore> {
        self.collections
            .iter()
            .filter(|c| matches!(c.outcome, RestoreOutcome::Failed(_)))
    }
}

/// Replays archives from a run directory into a store.
pub struct ArchiveRestorer<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> ArchiveRestorer<'a, S> {
    /// Create a restorer writing into `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Restore the configured collections from `run_dir`.
    ///
    /// Missing and unreadable archives are reported per collection. Commit
    /// failures abort the whole run.
    pub fn restore(&self, run_dir: &Path, config: &RestoreConfig) -> Result<RestoreReport> {
        if config.collections.is_empty() {
            return Err(Error::missing("collections to restore"));
        }
        check_batch_size(self.store, config.batch_size)?;
        if !run_dir.is_dir() {
            return Err(Error::missing(format!(
                "backup run directory {}",
                run_dir.display()
            )));
        }

        let manifest = match RunManifest::read(run_dir) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable manifest, archives will not be verified");
                None
            }
        };

        tracing::info!(
            run_dir = %run_dir.display(),
            dry_run = config.dry_run,
            "starting restore"
        );

        let mut collections = Vec::with_capacity(config.collections.len());
        let mut writes = WriteStats::default();

        for collection in &config.collections {
            let archive = match load_archive(run_dir, collection, manifest.as_ref()) {
                Ok(archive) => archive,
                Err(e @ Error::ArchiveMissing { .. }) => {
                    tracing::warn!(collection = %collection, error = %e, "skipping collection");
                    collections.push(CollectionRestore {
                        collection: collection.clone(),
                        documents: 0,
                        outcome: RestoreOutcome::Missing,
                    });
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        collection = %collection,
                        error = %e,
                        "cannot restore collection"
                    );
                    collections.push(CollectionRestore {
                        collection: collection.clone(),
                        documents: 0,
                        outcome: RestoreOutcome::Failed(e.to_string()),
                    });
                    continue;
                }
            };

            let documents = archive.len();
            let outcome = if config.dry_run {
                tracing::info!(
                    collection = %collection,
                    documents,
                    "[dry run] would restore documents"
                );
                RestoreOutcome::DryRun
            } else {
                let stats = self.write_archive(collection, archive, config)?;
                writes.commits += stats.commits;
                writes.operations += stats.operations;
                tracing::info!(collection = %collection, documents, "restored documents");
                RestoreOutcome::Restored
            };

            collections.push(CollectionRestore {
                collection: collection.clone(),
                documents,
                outcome,
            });
        }

        Ok(RestoreReport {
            dry_run: config.dry_run,
            collections,
            writes,
        })
    }

    fn write_archive(
        &self,
        collection: &str,
        archive: Archive,
        config: &RestoreConfig,
    ) -> Result<WriteStats> {
        let mut writer =
            BatchWriter::new(self.store, config.batch_size)?.with_deadline(config.deadline);
        writer.set_stage(format!("restore:{}", collection));

        for (id, body) in archive.documents {
            writer.enqueue(PendingWrite::set(DocRef::new(collection, id), body))?;
        }
        writer.flush()
    }
}

/// Read, verify and decode the archive of one collection.
fn load_archive(
    run_dir: &Path,
    collection: &str,
    manifest: Option<&RunManifest>,
) -> Result<Archive> {
    let path = run_dir.join(Archive::file_name(collection));
    if !path.is_file() {
        return Err(Error::ArchiveMissing {
            collection: collection.to_string(),
            path,
        });
    }

    let read_failure = |reason: String| Error::ArchiveReadFailure {
        collection: collection.to_string(),
        path: path.clone(),
        reason,
    };

    let bytes = std::fs::read(&path).map_err(|e| read_failure(e.to_string()))?;

    if let Some(entry) = manifest.and_then(|m| m.entry(collection)) {
        let actual = checksum(&bytes);
        if actual != entry.sha256 {
            return Err(read_failure(format!(
                "checksum mismatch: manifest {}, file {}",
                entry.sha256, actual
            )));
        }
    }

    let text = String::from_utf8(bytes).map_err(|e| read_failure(e.to_string()))?;
    let archive = codec::decode(&text, collection).map_err(|e| read_failure(e.to_string()))?;

    if archive.collection != collection {
        tracing::debug!(
            collection,
            archived_as = %archive.collection,
            "archive was exported under a different collection name"
        );
    }
    Ok(archive)
}
