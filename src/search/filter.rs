use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::ProteinRecord;
use crate::model::record::significance_from_p;

/// Numeric range filter. Absent bounds are unbounded (p-value bounds default to
/// [0, 1], fold-change magnitudes to [0, inf)).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedFilter {
    pub min_p: Option<f64>,
    pub max_p: Option<f64>,
    pub min_fc_left: Option<f64>,
    pub max_fc_left: Option<f64>,
    pub min_fc_right: Option<f64>,
    pub max_fc_right: Option<f64>,
    pub search_left: bool,
    pub search_right: bool,
}

impl AdvancedFilter {
    pub fn matches(&self, record: &ProteinRecord) -> bool {
        // Bounds are compared in score space so a p-value equal to a bound stays
        // inside it.
        let sig = record.significance;
        if sig > significance_from_p(self.min_p.unwrap_or(0.0))
            || sig < significance_from_p(self.max_p.unwrap_or(1.0))
        {
            return false;
        }
        if !self.search_left && !self.search_right {
            return true;
        }
        let fc = record.fold_change;
        let left = self.search_left
            && fc >= -self.max_fc_left.unwrap_or(f64::INFINITY)
            && fc <= -self.min_fc_left.unwrap_or(0.0);
        let right = self.search_right
            && fc >= self.min_fc_right.unwrap_or(0.0)
            && fc <= self.max_fc_right.unwrap_or(f64::INFINITY);
        left || right
    }
}

/// Filter bounds as typed into the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAdvancedFilter {
    pub min_p: String,
    pub max_p: String,
    pub min_fc_left: String,
    pub max_fc_left: String,
    pub min_fc_right: String,
    pub max_fc_right: String,
    pub search_left: bool,
    pub search_right: bool,
}

impl RawAdvancedFilter {
    /// Unparsable bounds are dropped rather than rejected.
    pub fn to_filter(&self) -> AdvancedFilter {
        AdvancedFilter {
            min_p: parse_bound("min_p", &self.min_p),
            max_p: parse_bound("max_p", &self.max_p),
            min_fc_left: parse_bound("min_fc_left", &self.min_fc_left),
            max_fc_left: parse_bound("max_fc_left", &self.max_fc_left),
            min_fc_right: parse_bound("min_fc_right", &self.min_fc_right),
            max_fc_right: parse_bound("max_fc_right", &self.max_fc_right),
            search_left: self.search_left,
            search_right: self.search_right,
        }
    }
}

fn parse_bound(field: &'static str, value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            debug!(field, value, "ignoring unparsable filter bound");
            None
        }
    }
}
