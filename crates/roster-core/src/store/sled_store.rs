//! Embedded document store on sled.

use sled::transaction::ConflictableTransactionError;
use sled::{Db, Tree};

use super::{DocRef, DocumentStore, DocumentStream, PendingWrite, StoreConfig, WriteOp};
use crate::backup::codec::{decode_document, encode_document};
use crate::document::{Document, Value};
use crate::error::{Error, Result};

/// Tree holding every document of every collection.
const DOCUMENTS_TREE: &str = "documents";

/// Byte between collection name and document id in a key.
const KEY_SEPARATOR: u8 = 0;

/// Document store backed by a single sled tree.
///
/// Key format: `[collection bytes][0x00][id bytes]`, so a prefix scan over
/// `collection\0` yields one collection in ascending id order. Values are the
/// archive codec's JSON encoding of the document.
pub struct SledDocumentStore {
    db: Db,
    documents: Tree,
    commit_limit: usize,
}

impl SledDocumentStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let db = config.to_sled_config().open()?;
        let documents = db.open_tree(DOCUMENTS_TREE)?;

        tracing::debug!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "document store opened"
        );

        Ok(Self {
            db,
            documents,
            commit_limit: config.commit_limit,
        })
    }

    /// Fetch a single document.
    pub fn get(&self, target: &DocRef) -> Result<Option<Document>> {
        match self.documents.get(document_key(target))? {
            Some(bytes) => Ok(Some(decode_stored(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl DocumentStore for SledDocumentStore {
    fn stream_collection(&self, collection: &str) -> DocumentStream<'_> {
        let prefix = collection_prefix(collection);
        let prefix_len = prefix.len();
        Box::new(self.documents.scan_prefix(prefix).map(move |item| -> Result<(String, Document)> {
            let (key, bytes) = item?;
            let id = String::from_utf8(key[prefix_len..].to_vec())
                .map_err(|e| Error::InvalidData(format!("document id is not UTF-8: {}", e)))?;
            Ok((id, decode_stored(&bytes)?))
        }))
    }

    fn batch_commit(&self, writes: &[PendingWrite]) -> Result<()> {
        if writes.len() > self.commit_limit {
            return Err(Error::InvalidData(format!(
                "batch of {} writes exceeds the commit limit of {}",
                writes.len(),
                self.commit_limit
            )));
        }

        self.documents
            .transaction(|tx| {
                for write in writes {
                    let key = document_key(&write.target);
                    let body = match write.op {
                        WriteOp::Set => write.payload.clone(),
                        WriteOp::Update => {
                            let existing = tx.get(&key)?.ok_or_else(|| {
                                ConflictableTransactionError::Abort(format!(
                                    "cannot update missing document {}",
                                    write.target
                                ))
                            })?;
                            let mut document = decode_stored(&existing).map_err(|e| {
                                ConflictableTransactionError::Abort(format!(
                                    "{}: {}",
                                    write.target, e
                                ))
                            })?;
                            document.merge(&write.payload);
                            document
                        }
                    };
                    let bytes = serde_json::to_vec(&encode_document(&body)).map_err(|e| {
                        ConflictableTransactionError::Abort(format!("{}: {}", write.target, e))
                    })?;
                    tx.insert(key, bytes)?;
                }
                Ok(())
            })
            .map_err(|e| match e {
                sled::transaction::TransactionError::Abort(reason) => Error::InvalidData(reason),
                sled::transaction::TransactionError::Storage(err) => Error::Storage(err),
            })?;

        self.db.flush()?;
        Ok(())
    }

    fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<(String, Document)>> {
        let mut matches = Vec::new();
        if limit == 0 {
            return Ok(matches);
        }
        for item in self.stream_collection(collection) {
            let (id, document) = item?;
            if document.get(field) == Some(value) {
                matches.push((id, document));
                if matches.len() >= limit {
                    break;
                }
            }
        }
        Ok(matches)
    }

    fn max_batch_operations(&self) -> usize {
        self.commit_limit
    }
}

fn collection_prefix(collection: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(collection.len() + 1);
    prefix.extend_from_slice(collection.as_bytes());
    prefix.push(KEY_SEPARATOR);
    prefix
}

fn document_key(target: &DocRef) -> Vec<u8> {
    let mut key = collection_prefix(&target.collection);
    key.extend_from_slice(target.id.as_bytes());
    key
}

fn decode_stored(bytes: &[u8]) -> Result<Document> {
    let json: serde_json::Value = serde_json::from_slice(bytes)?;
    decode_document(json)
}
