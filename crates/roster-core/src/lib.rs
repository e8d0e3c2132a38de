//! Roster Core - hierarchy migration and collection backup/restore.
//!
//! This crate provides the document model, the sled-backed document store,
//! the batched write executor and the engines built on top of them.

pub mod backup;
pub mod document;
pub mod error;
pub mod migration;
pub mod store;
pub mod writer;

pub use backup::{
    ArchiveRestorer, ExportConfig, ExportReport, RestoreConfig, RestoreOutcome, RestoreReport,
    RunManifest, SnapshotExporter, DEFAULT_COLLECTIONS,
};
pub use document::{Document, Value};
pub use error::{Error, Result};
pub use migration::{
    AmbiguousDomainOwner, HierarchyMigrator, MigrationConfig, MigrationPlan, MigrationReport, Role,
};
pub use store::{DocRef, DocumentStore, PendingWrite, SledDocumentStore, StoreConfig, WriteOp};
pub use writer::{BatchWriter, WriteStats, DEFAULT_BATCH_SIZE};
