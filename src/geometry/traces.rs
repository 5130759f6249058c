use serde::{Deserialize, Serialize};

use crate::geometry::{AxisRanges, PlotPoint};
use crate::model::{Cutoffs, SignificanceClass, VolcanoSettings};
use crate::selection::annotation::Annotation;
use crate::selection::palette::{default_color, selection_color};
use crate::selection::{PlotState, SelectionState};
use crate::store::TabularStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub protein_id: String,
    pub comparison: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    pub color: String,
    pub is_selection: bool,
    pub points: Vec<TracePoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideLine {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// Everything the chart renderer needs for one volcano plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolcanoTraces {
    pub ranges: AxisRanges,
    pub traces: Vec<Trace>,
    pub guides: Vec<GuideLine>,
    pub annotations: Vec<Annotation>,
}

pub fn plot_points(store: &TabularStore, cutoffs: &Cutoffs, selection: &SelectionState) -> Vec<PlotPoint> {
    store
        .records()
        .iter()
        .map(|record| {
            let class = cutoffs.classify(record);
            let color = selection
                .groups_of(&record.primary_id)
                .first()
                .and_then(|group| selection.color_map.get(*group))
                .cloned()
                .unwrap_or_else(|| default_color(class.label()).to_string());
            PlotPoint {
                protein_id: record.primary_id.clone(),
                comparison: record.comparison.clone(),
                gene_name: record.gene_names.clone(),
                x: record.fold_change,
                y: record.significance,
                color,
                significant: class == SignificanceClass::SignificantBoth,
                class,
            }
        })
        .collect()
}

/// Background significance categories first, then one trace per selection
/// group in display order. Each point lands in exactly one trace: its first
/// group, or its significance category when it has none.
pub fn build_traces(points: &[PlotPoint], state: &PlotState, settings: &VolcanoSettings) -> VolcanoTraces {
    let ranges = AxisRanges::from_points(points, settings.axis_padding, settings.y_axis);
    let selection = &state.selection;
    let first_groups: Vec<Option<&str>> = points
        .iter()
        .map(|p| selection.groups_of(&p.protein_id).first().copied())
        .collect();

    let mut traces = Vec::new();
    for class in SignificanceClass::ALL {
        let members: Vec<TracePoint> = points
            .iter()
            .zip(&first_groups)
            .filter(|(p, group)| group.is_none() && p.class == class)
            .map(|(p, _)| trace_point(p))
            .collect();
        if members.is_empty() {
            continue;
        }
        traces.push(Trace {
            name: class.label().to_string(),
            color: default_color(class.label()).to_string(),
            is_selection: false,
            points: members,
        });
    }

    for (idx, name) in selection.selections_name.iter().enumerate() {
        let members: Vec<TracePoint> = points
            .iter()
            .zip(&first_groups)
            .filter(|(_, group)| **group == Some(name.as_str()))
            .map(|(p, _)| trace_point(p))
            .collect();
        let color = selection
            .color_map
            .get(name)
            .cloned()
            .unwrap_or_else(|| selection_color(idx).to_string());
        traces.push(Trace {
            name: name.clone(),
            color,
            is_selection: true,
            points: members,
        });
    }

    let guides = if settings.show_cutoff_lines {
        cutoff_guides(&settings.cutoffs, &ranges)
    } else {
        Vec::new()
    };

    VolcanoTraces {
        ranges,
        traces,
        guides,
        annotations: state.annotations.iter().cloned().collect(),
    }
}

fn trace_point(p: &PlotPoint) -> TracePoint {
    let label = p
        .gene_name
        .as_deref()
        .and_then(|g| crate::model::record::split_aliases(g).next())
        .unwrap_or(&p.protein_id)
        .to_string();
    TracePoint {
        protein_id: p.protein_id.clone(),
        comparison: p.comparison.clone(),
        label,
        x: p.x,
        y: p.y,
    }
}

fn cutoff_guides(cutoffs: &Cutoffs, ranges: &AxisRanges) -> Vec<GuideLine> {
    let fc = cutoffs.log2_fc_cutoff;
    let sig = cutoffs.significance_threshold();
    vec![
        GuideLine {
            x0: -fc,
            y0: ranges.y.min,
            x1: -fc,
            y1: ranges.y.max,
        },
        GuideLine {
            x0: fc,
            y0: ranges.y.min,
            x1: fc,
            y1: ranges.y.max,
        },
        GuideLine {
            x0: ranges.x.min,
            y0: sig,
            x1: ranges.x.max,
            y1: sig,
        },
    ]
}

#[cfg(test)]
#[path = "../../tests/src_inline/geometry/traces.rs"]
mod tests;
