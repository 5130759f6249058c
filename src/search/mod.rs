use std::collections::HashSet;

use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{Cutoffs, ProteinRecord};
use crate::store::TabularStore;

pub mod filter;
pub mod suggest;

pub use filter::{AdvancedFilter, RawAdvancedFilter};
pub use suggest::suggest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdentifierField {
    #[default]
    GeneName,
    PrimaryId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub identifier_field: IdentifierField,
    pub regex: bool,
    pub exact: bool,
    pub significant_only: bool,
    pub advanced: Option<AdvancedFilter>,
}

impl SearchQuery {
    pub fn from_text(raw: &str, identifier_field: IdentifierField) -> Self {
        Self {
            terms: split_terms(raw),
            identifier_field,
            ..Self::default()
        }
    }

    pub fn with_regex(mut self, regex: bool) -> Self {
        self.regex = regex;
        self
    }

    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    pub fn with_significant_only(mut self, significant_only: bool) -> Self {
        self.significant_only = significant_only;
        self
    }

    pub fn with_advanced(mut self, advanced: Option<AdvancedFilter>) -> Self {
        self.advanced = advanced;
        self
    }
}

/// Non-empty trimmed terms, split on newlines and semicolons, in input order.
pub fn split_terms(raw: &str) -> Vec<String> {
    raw.split(['\n', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum QueryError {
    #[error("invalid regex term '{term}': {message}")]
    InvalidRegexTerm { term: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub protein_id: String,
    pub gene_name: Option<String>,
    pub is_significant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResultGroup {
    pub search_term: String,
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    pub error: Option<QueryError>,
}

enum Matcher {
    Plain { needle: String, exact: bool },
    Pattern(Regex),
}

impl Matcher {
    fn compile(term: &str, query: &SearchQuery) -> Result<Self, QueryError> {
        if query.regex {
            RegexBuilder::new(term)
                .case_insensitive(true)
                .build()
                .map(Matcher::Pattern)
                .map_err(|e| QueryError::InvalidRegexTerm {
                    term: term.to_string(),
                    message: e.to_string(),
                })
        } else {
            Ok(Matcher::Plain {
                needle: term.to_lowercase(),
                exact: query.exact,
            })
        }
    }

    fn matches(&self, aliases: &[String], lowered: &[String]) -> bool {
        match self {
            Matcher::Plain { needle, exact: true } => lowered.iter().any(|a| a == needle),
            Matcher::Plain { needle, exact: false } => {
                lowered.iter().any(|a| a.contains(needle.as_str()))
            }
            Matcher::Pattern(re) => aliases.iter().any(|a| re.is_match(a)),
        }
    }
}

/// Identifier aliases of every record, prepared once per batch.
struct FieldIndex {
    aliases: Vec<Vec<String>>,
    lowered: Vec<Vec<String>>,
}

impl FieldIndex {
    fn build(records: &[ProteinRecord], field: IdentifierField) -> Self {
        let aliases: Vec<Vec<String>> = records
            .iter()
            .map(|r| match field {
                IdentifierField::GeneName => r.gene_aliases().map(str::to_string).collect(),
                IdentifierField::PrimaryId => r.id_aliases().map(str::to_string).collect(),
            })
            .collect();
        let lowered = aliases
            .iter()
            .map(|names| names.iter().map(|n| n.to_lowercase()).collect())
            .collect();
        Self { aliases, lowered }
    }
}

/// Runs every term of the query against the store. Never fails: a bad regex
/// degrades to an empty group carrying the error.
pub fn search(store: &TabularStore, query: &SearchQuery, cutoffs: &Cutoffs) -> Vec<BatchResultGroup> {
    if query.terms.is_empty() {
        return Vec::new();
    }
    let index = FieldIndex::build(store.records(), query.identifier_field);
    let groups: Vec<BatchResultGroup> = query
        .terms
        .par_iter()
        .map(|term| search_term(store, &index, term, query, cutoffs))
        .collect();
    let matched: usize = groups.iter().map(|g| g.total_count).sum();
    info!(terms = groups.len(), matched, "batch search finished");
    groups
}

fn search_term(
    store: &TabularStore,
    index: &FieldIndex,
    term: &str,
    query: &SearchQuery,
    cutoffs: &Cutoffs,
) -> BatchResultGroup {
    let matcher = match Matcher::compile(term, query) {
        Ok(m) => m,
        Err(err) => {
            warn!(term, error = %err, "search term skipped");
            return BatchResultGroup {
                search_term: term.to_string(),
                results: Vec::new(),
                total_count: 0,
                error: Some(err),
            };
        }
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut results = Vec::new();
    for (idx, record) in store.records().iter().enumerate() {
        if !matcher.matches(&index.aliases[idx], &index.lowered[idx]) {
            continue;
        }
        if let Some(advanced) = &query.advanced {
            if !advanced.matches(record) {
                continue;
            }
        }
        let is_significant = cutoffs.is_significant(record);
        if query.significant_only && !is_significant {
            continue;
        }
        if !seen.insert(record.primary_id.as_str()) {
            continue;
        }
        results.push(SearchResult {
            protein_id: record.primary_id.clone(),
            gene_name: record.gene_names.clone(),
            is_significant,
        });
    }

    BatchResultGroup {
        search_term: term.to_string(),
        total_count: results.len(),
        results,
        error: None,
    }
}

/// Union of all groups' protein ids in first-seen order.
pub fn flatten_unique_ids(groups: &[BatchResultGroup]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for group in groups {
        for result in &group.results {
            if seen.insert(result.protein_id.as_str()) {
                out.push(result.protein_id.clone());
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/src_inline/search/tests.rs"]
mod tests;
