use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{AxisLimits, VolcanoSettings};
use crate::selection::SelectionState;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Settings fields a variant captures; all others are left as they are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapturedCutoffs {
    pub p_cutoff: f64,
    pub log2_fc_cutoff: f64,
    pub y_axis: Option<AxisLimits>,
}

impl CapturedCutoffs {
    pub fn capture(settings: &VolcanoSettings) -> Self {
        Self {
            p_cutoff: settings.cutoffs.p_cutoff,
            log2_fc_cutoff: settings.cutoffs.log2_fc_cutoff,
            y_axis: settings.y_axis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsVariant {
    pub name: String,
    pub description: String,
    pub cutoffs: CapturedCutoffs,
    pub selected_map: BTreeMap<String, BTreeMap<String, bool>>,
    pub selections_name: Vec<String>,
    /// Epoch milliseconds.
    pub date_modified: i64,
}

impl SettingsVariant {
    pub fn capture(
        name: &str,
        description: &str,
        settings: &VolcanoSettings,
        selection: &SelectionState,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            cutoffs: CapturedCutoffs::capture(settings),
            selected_map: selection.selected_map.clone(),
            selections_name: selection.selections_name.clone(),
            date_modified: now_millis(),
        }
    }
}

/// Overlays the captured fields onto `current`.
pub fn apply(variant: &SettingsVariant, current: &VolcanoSettings) -> VolcanoSettings {
    let mut next = current.clone();
    next.cutoffs.p_cutoff = variant.cutoffs.p_cutoff;
    next.cutoffs.log2_fc_cutoff = variant.cutoffs.log2_fc_cutoff;
    next.y_axis = variant.cutoffs.y_axis;
    next
}

/// The selection snapshot exactly as captured.
pub fn load(variant: &SettingsVariant) -> (BTreeMap<String, BTreeMap<String, bool>>, Vec<String>) {
    (variant.selected_map.clone(), variant.selections_name.clone())
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Named variants, optionally mirrored to a JSON file after every change.
#[derive(Debug, Default)]
pub struct VariantStore {
    variants: BTreeMap<String, SettingsVariant>,
    path: Option<PathBuf>,
}

impl VariantStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a file-backed store; a missing file starts empty.
    pub fn open(path: &Path) -> Result<Self, StateError> {
        let variants = if path.exists() {
            let bytes = fs::read(path)?;
            let list: Vec<SettingsVariant> = serde_json::from_slice(&bytes)?;
            list.into_iter().map(|v| (v.name.clone(), v)).collect()
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), count = variants.len(), "variant store opened");
        Ok(Self {
            variants,
            path: Some(path.to_path_buf()),
        })
    }

    /// Stores by name, replacing any variant with the same name, and stamps the
    /// current time.
    pub fn save(&mut self, variant: SettingsVariant) -> Result<SettingsVariant, StateError> {
        self.save_at(variant, now_millis())
    }

    pub fn save_at(
        &mut self,
        mut variant: SettingsVariant,
        date_modified: i64,
    ) -> Result<SettingsVariant, StateError> {
        variant.date_modified = date_modified;
        let mut next = self.variants.clone();
        let replaced = next.insert(variant.name.clone(), variant.clone()).is_some();
        self.persist(&next)?;
        self.variants = next;
        info!(name = %variant.name, replaced, "settings variant saved");
        Ok(variant)
    }

    /// Removing an unknown name is a no-op that returns `false`.
    pub fn delete(&mut self, name: &str) -> Result<bool, StateError> {
        let mut next = self.variants.clone();
        if next.remove(name).is_none() {
            debug!(name, "variant not found; nothing to delete");
            return Ok(false);
        }
        self.persist(&next)?;
        self.variants = next;
        info!(name, "settings variant deleted");
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Option<&SettingsVariant> {
        self.variants.get(name)
    }

    /// Newest first; equal timestamps by name.
    pub fn list(&self) -> Vec<SettingsVariant> {
        let mut out: Vec<SettingsVariant> = self.variants.values().cloned().collect();
        out.sort_by(|a, b| {
            b.date_modified
                .cmp(&a.date_modified)
                .then_with(|| a.name.cmp(&b.name))
        });
        out
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Writes `variants` to the backing file; memory is only updated by the
    /// caller once this succeeds.
    fn persist(&self, variants: &BTreeMap<String, SettingsVariant>) -> Result<(), StateError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let list: Vec<&SettingsVariant> = variants.values().collect();
        fs::write(path, serde_json::to_vec_pretty(&list)?)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/variants/tests.rs"]
mod tests;
