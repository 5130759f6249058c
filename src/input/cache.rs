use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::input::{ColumnMapping, IngestError};
use crate::model::ProteinRecord;
use crate::store::{IngestReport, TabularStore};

const CACHE_MAGIC: &str = "KIRAVOL1";
const CACHE_VERSION: u32 = 1;

pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = Fnv64::new();
    hasher.update(data);
    hasher.finish()
}

/// Content identity of one ingestion: both source texts plus the column mapping.
pub fn content_hash(
    raw_text: &str,
    processed_text: &str,
    mapping: &ColumnMapping,
) -> Result<u64, IngestError> {
    let mapping_bytes =
        serde_json::to_vec(mapping).map_err(|e| IngestError::Cache(e.to_string()))?;
    let mut hasher = Fnv64::new();
    hasher.update(raw_text.as_bytes());
    hasher.update(&[0xff]);
    hasher.update(processed_text.as_bytes());
    hasher.update(&[0xff]);
    hasher.update(&mapping_bytes);
    Ok(hasher.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Built,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    magic: String,
    version: u32,
    content_hash: u64,
    report: IngestReport,
    records: Vec<ProteinRecord>,
}

/// Directory of parsed stores keyed by dataset identifier.
#[derive(Debug, Clone)]
pub struct StoreCache {
    dir: PathBuf,
}

impl StoreCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, dataset_id: &str) -> PathBuf {
        let name: String = dataset_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.store.json"))
    }

    /// Reuses the cached store when its content hash matches, otherwise parses
    /// and writes a fresh cache entry.
    pub fn load_or_build(
        &self,
        dataset_id: &str,
        raw_text: &str,
        processed_text: &str,
        mapping: &ColumnMapping,
    ) -> Result<(TabularStore, CacheOutcome), IngestError> {
        let hash = content_hash(raw_text, processed_text, mapping)?;
        let path = self.path_for(dataset_id);
        match read_cache(&path, hash) {
            Ok(Some(store)) => {
                info!(dataset_id, path = %path.display(), "store cache hit");
                return Ok((store, CacheOutcome::Hit));
            }
            Ok(None) => debug!(dataset_id, "store cache miss"),
            Err(err) => warn!(dataset_id, error = %err, "store cache unreadable; rebuilding"),
        }
        let store = TabularStore::build(raw_text, processed_text, mapping)?;
        self.persist(&path, hash, &store);
        Ok((store, CacheOutcome::Built))
    }

    /// Forced rebuild: drops any cached entry before parsing.
    pub fn rebuild(
        &self,
        dataset_id: &str,
        raw_text: &str,
        processed_text: &str,
        mapping: &ColumnMapping,
    ) -> Result<TabularStore, IngestError> {
        self.invalidate(dataset_id)?;
        let (store, _) = self.load_or_build(dataset_id, raw_text, processed_text, mapping)?;
        Ok(store)
    }

    /// Returns whether an entry existed.
    pub fn invalidate(&self, dataset_id: &str) -> Result<bool, IngestError> {
        let path = self.path_for(dataset_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        info!(dataset_id, "store cache invalidated");
        Ok(true)
    }

    fn persist(&self, path: &Path, hash: u64, store: &TabularStore) {
        if let Err(err) = write_cache(path, hash, store) {
            warn!(path = %path.display(), error = %err, "failed to write store cache");
        }
    }
}

fn write_cache(path: &Path, hash: u64, store: &TabularStore) -> Result<(), IngestError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let envelope = CacheEnvelope {
        magic: CACHE_MAGIC.to_string(),
        version: CACHE_VERSION,
        content_hash: hash,
        report: store.report().clone(),
        records: store.records().to_vec(),
    };
    let bytes = serde_json::to_vec(&envelope).map_err(|e| IngestError::Cache(e.to_string()))?;
    fs::write(path, bytes)?;
    Ok(())
}

fn read_cache(path: &Path, hash: u64) -> Result<Option<TabularStore>, IngestError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let envelope: CacheEnvelope =
        serde_json::from_slice(&bytes).map_err(|e| IngestError::Cache(e.to_string()))?;
    if envelope.magic != CACHE_MAGIC
        || envelope.version != CACHE_VERSION
        || envelope.content_hash != hash
    {
        return Ok(None);
    }
    Ok(Some(TabularStore::from_records(
        envelope.records,
        envelope.report,
    )))
}

pub(crate) struct Fnv64 {
    hash: u64,
}

impl Fnv64 {
    pub(crate) fn new() -> Self {
        Self {
            hash: 0xcbf29ce484222325,
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        let mut h = self.hash;
        for &b in data {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        self.hash = h;
    }

    pub(crate) fn finish(&self) -> u64 {
        self.hash
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/cache.rs"]
mod tests;
