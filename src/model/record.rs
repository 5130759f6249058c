use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label used when the processed table has no comparison column or the cell is empty.
pub const DEFAULT_COMPARISON: &str = "1";

/// One processed row: a protein in one comparison.
///
/// Identity is `(primary_id, comparison)`; the same primary id may occur once per
/// comparison. Records are immutable after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinRecord {
    pub primary_id: String,
    pub gene_names: Option<String>,
    pub fold_change: f64,
    /// -log10(p-value)
    pub significance: f64,
    pub comparison: String,
    /// Sample name to intensity. Missing or imputed-away values are absent.
    pub intensities: BTreeMap<String, f64>,
}

impl ProteinRecord {
    /// First gene alias, used as the display label.
    pub fn primary_gene(&self) -> Option<&str> {
        self.gene_names
            .as_deref()
            .and_then(|names| split_aliases(names).next())
    }

    pub fn gene_aliases(&self) -> impl Iterator<Item = &str> {
        self.gene_names.as_deref().into_iter().flat_map(split_aliases)
    }

    pub fn id_aliases(&self) -> impl Iterator<Item = &str> {
        split_aliases(&self.primary_id)
    }
}

/// Gene and protein-group columns pack several names separated by `;`.
pub fn split_aliases(value: &str) -> impl Iterator<Item = &str> {
    value.split(';').map(str::trim).filter(|s| !s.is_empty())
}

pub fn significance_from_p(p_value: f64) -> f64 {
    -p_value.log10()
}
