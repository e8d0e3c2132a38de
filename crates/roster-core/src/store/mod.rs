//! Document store collaborator.
//!
//! The engine only talks to storage through [`DocumentStore`]. The crate ships
//! [`SledDocumentStore`], an embedded implementation on sled.

mod config;
mod sled_store;

pub use config::StoreConfig;
pub use sled_store::SledDocumentStore;

use std::fmt;

use crate::document::{Document, Value};
use crate::error::Result;

/// Commit ceiling of the stores this engine targets.
pub const DEFAULT_COMMIT_LIMIT: usize = 500;

/// Lazy, finite sequence of `(id, document)` pairs.
pub type DocumentStream<'a> = Box<dyn Iterator<Item = Result<(String, Document)>> + 'a>;

/// Reference to a document: collection plus id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocRef {
    /// Collection name.
    pub collection: String,
    /// Document id within the collection.
    pub id: String,
}

impl DocRef {
    /// Create a document reference.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Kind of write applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    /// Replace the whole document, creating it if absent.
    Set,
    /// Merge field paths into an existing document. Fails if it is absent.
    Update,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Set => write!(f, "set"),
            WriteOp::Update => write!(f, "update"),
        }
    }
}

/// A write waiting for the next batch commit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    /// Target document.
    pub target: DocRef,
    /// Set or update.
    pub op: WriteOp,
    /// Full body for [`WriteOp::Set`], field-path patch for [`WriteOp::Update`].
    pub payload: Document,
}

impl PendingWrite {
    /// Full-replacement write.
    pub fn set(target: DocRef, body: Document) -> Self {
        Self {
            target,
            op: WriteOp::Set,
            payload: body,
        }
    }

    /// Merge write.
    pub fn update(target: DocRef, patch: Document) -> Self {
        Self {
            target,
            op: WriteOp::Update,
            payload: patch,
        }
    }
}

/// Operations the engine needs from a document store.
pub trait DocumentStore {
    /// Stream every document of a collection. Each call starts from scratch.
    fn stream_collection(&self, collection: &str) -> DocumentStream<'_>;

    /// Apply all writes atomically: either every write lands or none does.
    fn batch_commit(&self, writes: &[PendingWrite]) -> Result<()>;

    /// Documents whose top-level `field` equals `value`, at most `limit`.
    fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<(String, Document)>>;

    /// Maximum number of writes accepted by one [`DocumentStore::batch_commit`].
    fn max_batch_operations(&self) -> usize {
        DEFAULT_COMMIT_LIMIT
    }

    /// Count the documents of a collection.
    fn count_documents(&self, collection: &str) -> Result<usize> {
        let mut count = 0;
        for item in self.stream_collection(collection) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}
