//! Snapshot exporter.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

use super::codec::{self, Archive};
use super::manifest::{checksum, ManifestEntry, RunManifest};
use crate::error::{Error, Result};
use crate::store::DocumentStore;

/// `strftime` format of run directory names. Sorts chronologically.
pub const RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Collections backed up when none are given.
pub const DEFAULT_COLLECTIONS: &[&str] = &[
    "users",
    "quizzes",
    "results",
    "app_settings",
    "team_members",
    "settings",
];

/// Export configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Collections to export, in order.
    pub collections: Vec<String>,
    /// Directory under which the run directory is created.
    pub destination_root: PathBuf,
}

impl ExportConfig {
    /// Export the default collections under `destination_root`.
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            collections: DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
            destination_root: destination_root.into(),
        }
    }

    /// Replace the collection list.
    pub fn with_collections<I, C>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.collections = collections.into_iter().map(Into::into).collect();
        self
    }

    /// Check the configuration before touching the store.
    pub fn validate(&self) -> Result<()> {
        if self.collections.is_empty() {
            return Err(Error::missing("collections to export"));
        }
        if self.destination_root.as_os_str().is_empty() {
            return Err(Error::missing("export destination directory"));
        }
        Ok(())
    }
}

/// Result for one exported collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionExport {
    /// Collection name.
    pub collection: String,
    /// Documents written.
    pub documents: usize,
    /// Archive path, `None` when the collection was empty and skipped.
    pub file: Option<PathBuf>,
}

/// Result of an export run.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Absolute path of the run directory.
    pub run_dir: PathBuf,
    /// Per-collection results, in export order.
    pub collections: Vec<CollectionExport>,
}

impl ExportReport {
    /// Total documents exported.
    pub fn total_documents(&self) -> usize {
        self.collections.iter().map(|c| c.documents).sum()
    }
}

/// Name of the run directory for an export started at `started`.
pub fn run_dir_name(started: &DateTime<Local>) -> String {
    started.format(RUN_DIR_FORMAT).to_string()
}

/// Streams collections out of a store into archive files.
pub struct SnapshotExporter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> SnapshotExporter<'a, S> {
    /// Create an exporter reading from `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Export every configured collection into a fresh run directory.
    pub fn export_all(&self, config: &ExportConfig) -> Result<ExportReport> {
        config.validate()?;

        let started = Local::now();
        std::fs::create_dir_all(&config.destination_root)?;
        let run_dir = config.destination_root.join(run_dir_name(&started));
        std::fs::create_dir(&run_dir)?;
        let run_dir = std::fs::canonicalize(&run_dir)?;

        tracing::info!(run_dir = %run_dir.display(), "starting export");

        let mut manifest = RunManifest::new(started.with_timezone(&Utc));
        let mut collections = Vec::with_capacity(config.collections.len());

        for collection in &config.collections {
            let result = self.export_collection(collection, &run_dir, &mut manifest)?;
            collections.push(result);
        }

        manifest.write(&run_dir)?;

        let report = ExportReport {
            run_dir,
            collections,
        };
        tracing::info!(
            run_dir = %report.run_dir.display(),
            documents = report.total_documents(),
            "export complete"
        );
        Ok(report)
    }

    fn export_collection(
        &self,
        collection: &str,
        run_dir: &Path,
        manifest: &mut RunManifest,
    ) -> Result<CollectionExport> {
        tracing::info!(collection, "backing up collection");

        let mut documents = BTreeMap::new();
        for item in self.store.stream_collection(collection) {
            let (id, document) = item?;
            documents.insert(id, document);
        }

        if documents.is_empty() {
            tracing::info!(collection, "collection is empty or does not exist, skipping");
            manifest.skipped.push(collection.to_string());
            return Ok(CollectionExport {
                collection: collection.to_string(),
                documents: 0,
                file: None,
            });
        }

        let file_name = Archive::file_name(collection);
        let path = run_dir.join(&file_name);
        let text = codec::encode(collection, &documents)?;
        std::fs::write(&path, text.as_bytes())?;

        manifest.archives.push(ManifestEntry {
            collection: collection.to_string(),
            file: file_name,
            documents: documents.len(),
            sha256: checksum(text.as_bytes()),
        });
        tracing::info!(
            collection,
            documents = documents.len(),
            path = %path.display(),
            "collection saved"
        );

        Ok(CollectionExport {
            collection: collection.to_string(),
            documents: documents.len(),
            file: Some(path),
        })
    }
}
