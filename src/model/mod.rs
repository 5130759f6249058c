pub mod record;
pub mod thresholds;

pub use record::{DEFAULT_COMPARISON, ProteinRecord};
pub use thresholds::{AxisLimits, Cutoffs, SignificanceClass, VolcanoSettings};
