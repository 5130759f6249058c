use serde::{Deserialize, Serialize};

use crate::geometry::{DEFAULT_HEIGHT_PX, DEFAULT_WIDTH_PX};
use crate::model::record::{ProteinRecord, significance_from_p};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cutoffs {
    pub p_cutoff: f64,
    pub log2_fc_cutoff: f64,
}

impl Default for Cutoffs {
    fn default() -> Self {
        Self::default_v1()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignificanceClass {
    SignificantBoth,
    SignificantPOnly,
    SignificantFcOnly,
    NotSignificant,
}

impl SignificanceClass {
    pub const ALL: [SignificanceClass; 4] = [
        SignificanceClass::SignificantBoth,
        SignificanceClass::SignificantPOnly,
        SignificanceClass::SignificantFcOnly,
        SignificanceClass::NotSignificant,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SignificanceClass::SignificantBoth => "P-value <= cutoff;FC > cutoff",
            SignificanceClass::SignificantPOnly => "P-value <= cutoff;FC <= cutoff",
            SignificanceClass::SignificantFcOnly => "P-value > cutoff;FC > cutoff",
            SignificanceClass::NotSignificant => "P-value > cutoff;FC <= cutoff",
        }
    }
}

impl Cutoffs {
    pub fn default_v1() -> Self {
        Self {
            p_cutoff: 0.05,
            log2_fc_cutoff: 0.6,
        }
    }

    /// Significance-score threshold; comparing in score space keeps a record whose
    /// p-value equals the cutoff on the significant side.
    pub fn significance_threshold(&self) -> f64 {
        significance_from_p(self.p_cutoff)
    }

    pub fn passes_p(&self, record: &ProteinRecord) -> bool {
        record.significance >= self.significance_threshold()
    }

    pub fn passes_fc(&self, record: &ProteinRecord) -> bool {
        record.fold_change.abs() > self.log2_fc_cutoff
    }

    pub fn is_significant(&self, record: &ProteinRecord) -> bool {
        self.passes_p(record) && self.passes_fc(record)
    }

    pub fn classify(&self, record: &ProteinRecord) -> SignificanceClass {
        match (self.passes_p(record), self.passes_fc(record)) {
            (true, true) => SignificanceClass::SignificantBoth,
            (true, false) => SignificanceClass::SignificantPOnly,
            (false, true) => SignificanceClass::SignificantFcOnly,
            (false, false) => SignificanceClass::NotSignificant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisLimits {
    pub min: f64,
    pub max: f64,
}

impl AxisLimits {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Global per-dataset view settings. Variants capture the cutoffs and the
/// explicit y-axis limits; everything else is left alone when a variant is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolcanoSettings {
    pub cutoffs: Cutoffs,
    pub y_axis: Option<AxisLimits>,
    pub width_px: f64,
    pub height_px: f64,
    pub pixel_radius: f64,
    pub axis_padding: f64,
    pub show_cutoff_lines: bool,
    pub title: String,
}

impl Default for VolcanoSettings {
    fn default() -> Self {
        Self {
            cutoffs: Cutoffs::default_v1(),
            y_axis: None,
            width_px: DEFAULT_WIDTH_PX,
            height_px: DEFAULT_HEIGHT_PX,
            pixel_radius: 10.0,
            axis_padding: 0.05,
            show_cutoff_lines: true,
            title: String::new(),
        }
    }
}
