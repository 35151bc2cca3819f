use std::path::PathBuf;

use thiserror::Error;

use crate::window::Window;

/// Everything that can go wrong while refining one outlet.
///
/// All variants are scoped to a single request. A batch driver logs them and moves on to the
/// next outlet, see [`crate::batch::delineate_batch`].
#[derive(Debug, Clone, Error)]
pub enum DelineationError {
    /// The backing raster could not be opened or is not a usable grid.
    #[error("dataset {path:?} is unavailable: {reason}")]
    DatasetUnavailable { path: PathBuf, reason: String },

    /// The requested window does not overlap the dataset at all.
    #[error("window {window:?} lies outside the dataset extent")]
    WindowOutOfBounds { window: Window },

    /// No cell inside the catchment has accumulation above the threshold.
    #[error("no stream cell with accumulation above {threshold} inside the catchment")]
    NoStreamFound { threshold: u32 },

    /// A cell was reached twice while walking upstream, so the flow directions contain a loop.
    ///
    /// `outlet` is the snapped `(lat, lng)` if snapping had already succeeded.
    #[error("flow directions form a cycle at row {row}, column {col}")]
    InvalidFlowGraph {
        row: usize,
        col: usize,
        outlet: Option<(f64, f64)>,
    },

    #[error("upstream trace produced no cells")]
    EmptyTrace,

    /// The terminal catchment polygon has no extent to build a window from.
    #[error("terminal catchment polygon is empty")]
    EmptyCatchment,

    /// A polygon part larger than the configured tolerance would have been thrown away.
    #[error("discarding a {discarded_cells:.1} cell polygon part exceeds the tolerance of {tolerance:.1} cells")]
    FragmentedResult { discarded_cells: f64, tolerance: f64 },
}

impl DelineationError {
    /// True for failures of the datasets themselves rather than of this particular outlet.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DelineationError::DatasetUnavailable { .. } | DelineationError::WindowOutOfBounds { .. }
        )
    }

    /// The snapped `(lat, lng)` that survived a failed trace, if any.
    pub fn snapped_outlet(&self) -> Option<(f64, f64)> {
        match self {
            DelineationError::InvalidFlowGraph { outlet, .. } => *outlet,
            _ => None,
        }
    }
}
