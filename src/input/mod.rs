use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod table;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required column '{column}' in {table} table")]
    MissingRequiredColumn { table: &'static str, column: String },
    #[error("unreadable source: {0}")]
    UnreadableSource(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache error: {0}")]
    Cache(String),
}

/// Header names of the processed (differential analysis) and raw (intensity)
/// tables. Supplied by the caller from dataset metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub primary_id: String,
    pub gene_names: Option<String>,
    pub fold_change: String,
    pub significance: String,
    pub comparison: Option<String>,
    /// Id column of the raw table; falls back to `primary_id`.
    pub raw_primary_id: Option<String>,
    /// Raw sample columns. Empty means every raw column except the id.
    pub samples: Vec<String>,
    /// Fold-change column holds a plain ratio; store log2 of it.
    pub transform_fold_change: bool,
    /// Significance column holds a p-value; store -log10 of it.
    pub transform_significance: bool,
    pub reverse_fold_change: bool,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            primary_id: "PrimaryID".to_string(),
            gene_names: Some("GeneNames".to_string()),
            fold_change: "FoldChange".to_string(),
            significance: "Significance".to_string(),
            comparison: None,
            raw_primary_id: None,
            samples: Vec::new(),
            transform_fold_change: false,
            transform_significance: false,
            reverse_fold_change: false,
        }
    }
}

impl ColumnMapping {
    pub fn raw_id_column(&self) -> &str {
        self.raw_primary_id.as_deref().unwrap_or(&self.primary_id)
    }
}

/// Reads a plain or gzip-compressed delimited file into memory.
pub fn read_source(path: &Path) -> Result<String, IngestError> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(String::new());
    }
    // SAFETY: the map is read once and copied out before the file handle drops.
    let mmap = unsafe { Mmap::map(&file)? };
    let bytes: &[u8] = &mmap;
    if is_gzip(path, bytes) {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut decoded)
            .map_err(|e| {
                IngestError::UnreadableSource(format!(
                    "gzip decode failed for {}: {e}",
                    path.display()
                ))
            })?;
        decode_utf8(decoded, path)
    } else {
        decode_utf8(bytes.to_vec(), path)
    }
}

fn is_gzip(path: &Path, bytes: &[u8]) -> bool {
    path.extension().is_some_and(|ext| ext == "gz") || bytes.starts_with(&[0x1f, 0x8b])
}

fn decode_utf8(bytes: Vec<u8>, path: &Path) -> Result<String, IngestError> {
    String::from_utf8(bytes).map_err(|e| {
        IngestError::UnreadableSource(format!("{} is not valid UTF-8: {e}", path.display()))
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
