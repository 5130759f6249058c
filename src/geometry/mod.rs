use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{AxisLimits, SignificanceClass};

pub mod traces;

pub use traces::{GuideLine, Trace, TracePoint, VolcanoTraces, build_traces, plot_points};

/// A record as drawn: x = fold-change, y = significance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub protein_id: String,
    pub comparison: String,
    pub gene_name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub significant: bool,
    pub class: SignificanceClass,
}

impl PlotPoint {
    pub fn same_identity(&self, other: &PlotPoint) -> bool {
        self.protein_id == other.protein_id && self.comparison == other.comparison
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRanges {
    pub x: AxisLimits,
    pub y: AxisLimits,
}

impl AxisRanges {
    /// Dataset min/max padded by `padding` of the span on both sides; explicit
    /// y-axis limits replace the derived y range.
    pub fn from_points(points: &[PlotPoint], padding: f64, y_override: Option<AxisLimits>) -> Self {
        let mut x = Bounds::default();
        let mut y = Bounds::default();
        for p in points {
            if p.x.is_finite() && p.y.is_finite() {
                x.push(p.x);
                y.push(p.y);
            }
        }
        let y_fallback = AxisLimits::new(0.0, 1.0);
        Self {
            x: x.padded(padding, AxisLimits::new(-1.0, 1.0)),
            y: match y_override {
                Some(limits) => usable_limits(limits, y_fallback),
                None => y.padded(padding, y_fallback),
            },
        }
    }
}

/// Explicit limits with a non-positive span are widened by one unit each side
/// (or swapped when inverted); non-finite limits give way to `fallback`.
fn usable_limits(limits: AxisLimits, fallback: AxisLimits) -> AxisLimits {
    let AxisLimits { min, max } = limits;
    if !min.is_finite() || !max.is_finite() {
        return fallback;
    }
    if min < max {
        limits
    } else if min > max {
        AxisLimits::new(max, min)
    } else {
        AxisLimits::new(min - 1.0, max + 1.0)
    }
}

#[derive(Default)]
struct Bounds {
    min: Option<f64>,
    max: Option<f64>,
}

impl Bounds {
    fn push(&mut self, v: f64) {
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    fn padded(&self, padding: f64, fallback: AxisLimits) -> AxisLimits {
        let (Some(min), Some(max)) = (self.min, self.max) else {
            return fallback;
        };
        let span = max - min;
        if span <= 0.0 {
            return AxisLimits::new(min - 1.0, max + 1.0);
        }
        let pad = span * padding.max(0.0);
        AxisLimits::new(min - pad, max + pad)
    }
}

pub const DEFAULT_WIDTH_PX: f64 = 800.0;
pub const DEFAULT_HEIGHT_PX: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotDimensions {
    pub width_px: f64,
    pub height_px: f64,
}

impl PlotDimensions {
    /// Zero, negative or non-finite sizes fall back to the default plot size.
    pub fn new(width_px: f64, height_px: f64) -> Self {
        let usable = |v: f64, default: f64| if v.is_finite() && v > 0.0 { v } else { default };
        Self {
            width_px: usable(width_px, DEFAULT_WIDTH_PX),
            height_px: usable(height_px, DEFAULT_HEIGHT_PX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Data space to screen space; screen y grows downward.
pub fn project(x: f64, y: f64, ranges: &AxisRanges, dims: &PlotDimensions) -> ScreenPoint {
    ScreenPoint {
        x: (x - ranges.x.min) / ranges.x.span() * dims.width_px,
        y: (ranges.y.max - y) / ranges.y.span() * dims.height_px,
    }
}

pub fn unproject(screen: ScreenPoint, ranges: &AxisRanges, dims: &PlotDimensions) -> (f64, f64) {
    (
        ranges.x.min + screen.x / dims.width_px * ranges.x.span(),
        ranges.y.max - screen.y / dims.height_px * ranges.y.span(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyProtein {
    pub point: PlotPoint,
    pub pixel_distance: f64,
    /// Screen-space offset from the clicked point, in pixels.
    pub delta_x: f64,
    pub delta_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickResult {
    pub clicked: PlotPoint,
    pub nearby: Vec<NearbyProtein>,
}

/// Projection of the current dataset, reused across clicks until the axis
/// ranges, plot dimensions or dataset version change.
#[derive(Debug, Clone)]
pub struct VolcanoGeometry {
    ranges: AxisRanges,
    dims: PlotDimensions,
    dataset_version: u64,
    projected: Option<Vec<ScreenPoint>>,
    projections: u64,
}

impl VolcanoGeometry {
    pub fn new(ranges: AxisRanges, dims: PlotDimensions) -> Self {
        Self {
            ranges: usable_ranges(ranges),
            dims: PlotDimensions::new(dims.width_px, dims.height_px),
            dataset_version: 0,
            projected: None,
            projections: 0,
        }
    }

    pub fn ranges(&self) -> &AxisRanges {
        &self.ranges
    }

    pub fn dimensions(&self) -> &PlotDimensions {
        &self.dims
    }

    pub fn set_ranges(&mut self, ranges: AxisRanges) {
        let ranges = usable_ranges(ranges);
        if ranges != self.ranges {
            self.ranges = ranges;
            self.projected = None;
        }
    }

    pub fn set_dimensions(&mut self, dims: PlotDimensions) {
        let dims = PlotDimensions::new(dims.width_px, dims.height_px);
        if dims != self.dims {
            self.dims = dims;
            self.projected = None;
        }
    }

    /// Callers bump the version whenever the point list they pass changes.
    pub fn set_dataset_version(&mut self, version: u64) {
        if version != self.dataset_version {
            self.dataset_version = version;
            self.projected = None;
        }
    }

    pub fn is_cached(&self) -> bool {
        self.projected.is_some()
    }

    /// Number of full projections performed so far.
    pub fn projection_count(&self) -> u64 {
        self.projections
    }

    fn projection(&mut self, points: &[PlotPoint]) -> &[ScreenPoint] {
        let stale = self
            .projected
            .as_ref()
            .is_none_or(|cached| cached.len() != points.len());
        if stale {
            let ranges = self.ranges;
            let dims = self.dims;
            let projected: Vec<ScreenPoint> = points
                .par_iter()
                .map(|p| project(p.x, p.y, &ranges, &dims))
                .collect();
            self.projections += 1;
            debug!(points = points.len(), "projection rebuilt");
            self.projected = Some(projected);
        }
        self.projected.as_deref().unwrap_or_default()
    }

    /// Points within `pixel_radius` of the clicked point, nearest first; ties
    /// keep dataset order. A click with no matching data point has no neighbors.
    pub fn find_nearby(
        &mut self,
        clicked: &PlotPoint,
        points: &[PlotPoint],
        pixel_radius: f64,
    ) -> ClickResult {
        let empty = ClickResult {
            clicked: clicked.clone(),
            nearby: Vec::new(),
        };
        let Some(clicked_idx) = points.iter().position(|p| p.same_identity(clicked)) else {
            return empty;
        };
        if !clicked.x.is_finite() || !clicked.y.is_finite() {
            return empty;
        }

        let projected = self.projection(points);
        let origin = projected[clicked_idx];
        let mut nearby: Vec<NearbyProtein> = projected
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != clicked_idx)
            .filter_map(|(idx, screen)| {
                let delta_x = screen.x - origin.x;
                let delta_y = screen.y - origin.y;
                let pixel_distance = delta_x.hypot(delta_y);
                (pixel_distance <= pixel_radius).then(|| NearbyProtein {
                    point: points[idx].clone(),
                    pixel_distance,
                    delta_x,
                    delta_y,
                })
            })
            .collect();
        nearby.sort_by(|a, b| a.pixel_distance.total_cmp(&b.pixel_distance));

        ClickResult {
            clicked: points[clicked_idx].clone(),
            nearby,
        }
    }
}

fn usable_ranges(ranges: AxisRanges) -> AxisRanges {
    AxisRanges {
        x: usable_limits(ranges.x, AxisLimits::new(-1.0, 1.0)),
        y: usable_limits(ranges.y, AxisLimits::new(0.0, 1.0)),
    }
}

/// One-off neighbor query without a persistent projection cache.
pub fn find_nearby(
    clicked: &PlotPoint,
    points: &[PlotPoint],
    ranges: AxisRanges,
    dims: PlotDimensions,
    pixel_radius: f64,
) -> ClickResult {
    VolcanoGeometry::new(ranges, dims).find_nearby(clicked, points, pixel_radius)
}

#[cfg(test)]
#[path = "../../tests/src_inline/geometry/tests.rs"]
mod tests;
