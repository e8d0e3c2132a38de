//! Run manifest written next to the archives of an export.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// File name of the manifest inside a run directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One archived collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Collection name.
    pub collection: String,
    /// Archive file name, relative to the run directory.
    pub file: String,
    /// Number of documents in the archive.
    pub documents: usize,
    /// Hex SHA-256 of the archive file bytes.
    pub sha256: String,
}

/// Summary of one export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    /// When the export started.
    pub created_at: DateTime<Utc>,
    /// Archives written, in export order.
    pub archives: Vec<ManifestEntry>,
    /// Collections that were empty and got no archive.
    #[serde(default)]
    pub skipped: Vec<String>,
}

impl RunManifest {
    /// Create an empty manifest.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            archives: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Look up the entry for a collection.
    pub fn entry(&self, collection: &str) -> Option<&ManifestEntry> {
        self.archives.iter().find(|e| e.collection == collection)
    }

    /// Write the manifest into `run_dir`.
    pub fn write(&self, run_dir: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(run_dir.join(MANIFEST_FILE), text)?;
        Ok(())
    }

    /// Read the manifest of `run_dir`, if it has one.
    ///
    /// Run directories produced by the legacy exporter carry no manifest.
    pub fn read(run_dir: &Path) -> Result<Option<Self>> {
        let path = run_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}

/// Hex SHA-256 of a byte slice.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
