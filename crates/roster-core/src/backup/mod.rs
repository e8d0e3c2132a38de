//! Collection snapshots: export to timestamped run directories and restore.
//!
//! A run directory looks like:
//!
//! ```text
//! backups/2024-05-20_12-00-00/
//!   manifest.json
//!   users.json
//!   quizzes.json
//! ```
//!
//! Empty collections get no archive file; they are listed under `skipped` in
//! the manifest instead.

pub mod codec;
pub mod export;
pub mod manifest;
pub mod restore;

pub use codec::{Archive, ARCHIVE_EXTENSION, ARCHIVE_FORMAT};
pub use export::{
    run_dir_name, CollectionExport, ExportConfig, ExportReport, SnapshotExporter,
    DEFAULT_COLLECTIONS, RUN_DIR_FORMAT,
};
pub use manifest::{ManifestEntry, RunManifest, MANIFEST_FILE};
pub use restore::{
    ArchiveRestorer, CollectionRestore, RestoreConfig, RestoreOutcome, RestoreReport,
};
