//! Manifest loading and artifact writing
//!
//! The only module that touches the filesystem. The pipeline itself takes
//! materialized trees and returns artifacts as values.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::model::Category;
use crate::pipeline::{
    export_csv_filename, governed_spec_filename, BatchOutcome, INVENTORY_FILENAME, SUMMARY_FILENAME,
};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: std::io::Error },

    #[error("{} is not valid JSON: {source}", path.display())]
    Json { path: PathBuf, source: serde_json::Error },

    #[error("manifest lists '{0}' more than once")]
    DuplicateId(String),

    #[error("manifest id '{0}' cannot be used as a file name")]
    InvalidId(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One input: identifier, category and the raw layout tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub category: Category,
    pub tree: Value,
}

impl ManifestEntry {
    pub fn new(id: impl Into<String>, category: Category, tree: Value) -> Self {
        Self { id: id.into(), category, tree }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    entries: Vec<ManifestFileEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestFileEntry {
    id: String,
    category: Category,
    path: PathBuf,
}

impl Manifest {
    pub fn push(&mut self, id: impl Into<String>, category: Category, tree: Value) {
        self.entries.push(ManifestEntry::new(id, category, tree));
    }

    /// Load a manifest file and every layout it lists.
    ///
    /// Layout paths are resolved relative to the manifest's directory. A
    /// layout that is not JSON at all fails the load; one that is JSON but
    /// not a spec tree is left for the pipeline to reject.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let listing: ManifestFile = read_json(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut seen = BTreeSet::new();
        let mut manifest = Manifest::default();
        for entry in listing.entries {
            check_id(&entry.id)?;
            if !seen.insert(entry.id.clone()) {
                return Err(ManifestError::DuplicateId(entry.id));
            }
            let tree: Value = read_json(&base.join(&entry.path))?;
            debug!(id = %entry.id, path = %entry.path.display(), "loaded layout");
            manifest.push(entry.id, entry.category, tree);
        }

        Ok(manifest)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn check_id(id: &str) -> Result<(), ManifestError> {
    let usable = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.chars().any(char::is_control);
    if usable { Ok(()) } else { Err(ManifestError::InvalidId(id.to_string())) }
}

/// Write every artifact of a batch into `dir`, creating it if needed.
///
/// Ids are checked before anything is written, so a duplicate never
/// overwrites an earlier entry's files. Returns the written paths in write
/// order.
pub fn write_artifacts(outcome: &BatchOutcome, dir: &Path) -> Result<Vec<PathBuf>, ManifestError> {
    fs::create_dir_all(dir).map_err(|source| ManifestError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    let mut write = |name: String, content: &str| -> Result<(), ManifestError> {
        let path = dir.join(name);
        fs::write(&path, content).map_err(|source| ManifestError::Write {
            path: path.clone(),
            source,
        })?;
        written.push(path);
        Ok(())
    };

    let mut seen = BTreeSet::new();
    for result in &outcome.results {
        if !seen.insert(result.page_id.as_str()) {
            return Err(ManifestError::DuplicateId(result.page_id.clone()));
        }
        check_id(&result.page_id)?;
    }

    for result in &outcome.results {
        write(governed_spec_filename(&result.page_id), &result.content)?;
        write(export_csv_filename(&result.page_id), &result.csv)?;
    }
    write(INVENTORY_FILENAME.to_string(), &outcome.inventory_csv())?;
    write(SUMMARY_FILENAME.to_string(), &serde_json::to_string_pretty(&outcome.summary)?)?;

    Ok(written)
}
