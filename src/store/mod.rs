use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::input::table::{DelimitedTable, non_empty, parse_number};
use crate::input::{ColumnMapping, IngestError};
use crate::model::record::significance_from_p;
use crate::model::{DEFAULT_COMPARISON, ProteinRecord};

const MAX_SKIP_WARNINGS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub rows_total: usize,
    pub rows_loaded: usize,
    pub rows_skipped: usize,
    pub comparisons: usize,
}

/// Indexed, immutable collection of processed records for one dataset.
#[derive(Debug, Clone)]
pub struct TabularStore {
    records: Vec<ProteinRecord>,
    by_primary_id: HashMap<String, Vec<usize>>,
    comparisons: Vec<String>,
    gene_names: Vec<String>,
    report: IngestReport,
}

impl TabularStore {
    pub fn build(
        raw_text: &str,
        processed_text: &str,
        mapping: &ColumnMapping,
    ) -> Result<Self, IngestError> {
        let intensities = parse_raw_intensities(raw_text, mapping)?;

        let mut table = DelimitedTable::parse(processed_text).ok_or_else(|| {
            IngestError::UnreadableSource("processed table has no header row".to_string())
        })?;
        let header = table.header.clone();
        let id_idx = header.require("processed", &mapping.primary_id)?;
        let fc_idx = header.require("processed", &mapping.fold_change)?;
        let sig_idx = header.require("processed", &mapping.significance)?;
        let gene_idx = header.optional("processed", mapping.gene_names.as_deref());
        let comparison_idx = header.optional("processed", mapping.comparison.as_deref());

        let mut records = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut report = IngestReport::default();

        for (line_no, fields) in &mut table {
            report.rows_total += 1;
            let parsed = parse_processed_row(
                &fields,
                mapping,
                id_idx,
                fc_idx,
                sig_idx,
                gene_idx,
                comparison_idx,
            );
            let Some((primary_id, gene_names, fold_change, significance, comparison)) = parsed
            else {
                skip_row(&mut report, line_no, "missing id or unparsable numeric field");
                continue;
            };
            if !seen.insert((primary_id.clone(), comparison.clone())) {
                skip_row(&mut report, line_no, "duplicate (primary id, comparison)");
                continue;
            }
            let intensities = intensities.get(&primary_id).cloned().unwrap_or_default();
            records.push(ProteinRecord {
                primary_id,
                gene_names,
                fold_change,
                significance,
                comparison,
                intensities,
            });
        }

        report.rows_loaded = records.len();
        let store = Self::from_records(records, report);
        info!(
            rows_total = store.report.rows_total,
            rows_loaded = store.report.rows_loaded,
            rows_skipped = store.report.rows_skipped,
            proteins = store.distinct_protein_count(),
            comparisons = store.comparisons.len(),
            "dataset ingested"
        );
        Ok(store)
    }

    /// Rebuilds the indices over records that were already validated, e.g. loaded
    /// from the on-disk cache.
    pub fn from_records(records: Vec<ProteinRecord>, mut report: IngestReport) -> Self {
        let mut by_primary_id: HashMap<String, Vec<usize>> = HashMap::new();
        let mut comparisons: Vec<String> = Vec::new();
        let mut gene_names: Vec<String> = Vec::new();
        let mut seen_genes: HashSet<String> = HashSet::new();

        for (idx, record) in records.iter().enumerate() {
            by_primary_id
                .entry(record.primary_id.clone())
                .or_default()
                .push(idx);
            if !comparisons.contains(&record.comparison) {
                comparisons.push(record.comparison.clone());
            }
            for gene in record.gene_aliases() {
                if seen_genes.insert(gene.to_string()) {
                    gene_names.push(gene.to_string());
                }
            }
        }
        report.comparisons = comparisons.len();

        Self {
            records,
            by_primary_id,
            comparisons,
            gene_names,
            report,
        }
    }

    pub fn get_by_primary_id(&self, id: &str) -> Vec<&ProteinRecord> {
        self.by_primary_id
            .get(id)
            .map(|idxs| idxs.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Records for every id in input order; repeated ids are returned once.
    pub fn get_by_primary_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&ProteinRecord> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            if !seen.insert(id) {
                continue;
            }
            if let Some(idxs) = self.by_primary_id.get(id) {
                out.extend(idxs.iter().map(|&i| &self.records[i]));
            }
        }
        out
    }

    pub fn get(&self, id: &str, comparison: &str) -> Option<&ProteinRecord> {
        self.by_primary_id
            .get(id)?
            .iter()
            .map(|&i| &self.records[i])
            .find(|r| r.comparison == comparison)
    }

    /// Gene aliases of the protein's first record.
    pub fn gene_names_of(&self, id: &str) -> Vec<&str> {
        self.by_primary_id
            .get(id)
            .and_then(|idxs| idxs.first())
            .map(|&i| self.records[i].gene_aliases().collect())
            .unwrap_or_default()
    }

    /// Distinct gene aliases in first-seen order.
    pub fn all_gene_names(&self) -> &[String] {
        &self.gene_names
    }

    pub fn distinct_protein_count(&self) -> usize {
        self.by_primary_id.len()
    }

    pub fn records(&self) -> &[ProteinRecord] {
        &self.records
    }

    pub fn comparisons(&self) -> &[String] {
        &self.comparisons
    }

    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

type ProcessedRow = (String, Option<String>, f64, f64, String);

fn parse_processed_row(
    fields: &[&str],
    mapping: &ColumnMapping,
    id_idx: usize,
    fc_idx: usize,
    sig_idx: usize,
    gene_idx: Option<usize>,
    comparison_idx: Option<usize>,
) -> Option<ProcessedRow> {
    let primary_id = non_empty(fields.get(id_idx).copied())?.to_string();

    let mut fold_change = parse_number(fields.get(fc_idx).copied())?;
    if mapping.transform_fold_change {
        if fold_change <= 0.0 {
            return None;
        }
        fold_change = fold_change.log2();
    }
    if mapping.reverse_fold_change {
        fold_change = -fold_change;
    }

    let mut significance = parse_number(fields.get(sig_idx).copied())?;
    if mapping.transform_significance {
        if !(0.0..=1.0).contains(&significance) {
            return None;
        }
        // Zero maps to the score of the smallest normal f64 rather than infinity.
        let p_value = if significance == 0.0 { f64::MIN_POSITIVE } else { significance };
        significance = significance_from_p(p_value);
    }

    let gene_names = gene_idx
        .and_then(|i| non_empty(fields.get(i).copied()))
        .map(str::to_string);
    let comparison = comparison_idx
        .and_then(|i| non_empty(fields.get(i).copied()))
        .unwrap_or(DEFAULT_COMPARISON)
        .to_string();

    Some((primary_id, gene_names, fold_change, significance, comparison))
}

fn skip_row(report: &mut IngestReport, line_no: usize, reason: &str) {
    report.rows_skipped += 1;
    if report.rows_skipped <= MAX_SKIP_WARNINGS {
        warn!(line = line_no, reason, "skipping processed row");
    } else {
        debug!(line = line_no, reason, "skipping processed row");
    }
}

fn parse_raw_intensities(
    raw_text: &str,
    mapping: &ColumnMapping,
) -> Result<HashMap<String, BTreeMap<String, f64>>, IngestError> {
    let mut out: HashMap<String, BTreeMap<String, f64>> = HashMap::new();
    if raw_text.trim().is_empty() {
        return Ok(out);
    }
    let Some(mut table) = DelimitedTable::parse(raw_text) else {
        return Ok(out);
    };
    let header = table.header.clone();
    let id_idx = header.require("raw", mapping.raw_id_column())?;

    let sample_cols: Vec<(usize, String)> = if mapping.samples.is_empty() {
        header
            .columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != id_idx)
            .map(|(idx, name)| (idx, name.clone()))
            .collect()
    } else {
        mapping
            .samples
            .iter()
            .filter_map(|name| {
                header
                    .optional("raw", Some(name.as_str()))
                    .map(|idx| (idx, name.clone()))
            })
            .collect()
    };

    for (_, fields) in &mut table {
        let Some(id) = non_empty(fields.get(id_idx).copied()) else {
            continue;
        };
        if out.contains_key(id) {
            continue;
        }
        let values = sample_cols
            .iter()
            .filter_map(|(idx, name)| {
                parse_number(fields.get(*idx).copied()).map(|v| (name.clone(), v))
            })
            .collect();
        out.insert(id.to_string(), values);
    }
    debug!(rows = out.len(), samples = sample_cols.len(), "raw intensities parsed");
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/src_inline/store/tests.rs"]
mod tests;
