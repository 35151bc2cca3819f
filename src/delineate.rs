use geo::{MultiPolygon, Polygon};

use crate::config::DelineationConfig;
use crate::error::DelineationError;
use crate::mask::{apply_mask, catchment_mask};
use crate::polygonize::{nudge_outlet, polygonize};
use crate::raster::RasterSource;
use crate::snap::snap_to_stream;
use crate::trace::upstream_cells;
use crate::window::Window;

/// The part of the terminal unit catchment draining to the outlet.
#[derive(Debug, Clone, PartialEq)]
pub struct Refined {
    pub polygon: Polygon<f64>,
    /// Latitude of the centre of the snapped cell.
    pub lat: f64,
    /// Longitude of the centre of the snapped cell.
    pub lng: f64,
    /// Number of grid cells in the traced area.
    pub cells: usize,
}

/// Delineates the area of the terminal unit catchment upstream of an outlet.
///
/// Only the window around `catchment` is read from the two grids. Both grids are zeroed outside
/// the catchment before anything else happens, so neither the snapped outlet nor the traced area
/// can spill into a neighbouring basin at a confluence. The outlet is then snapped to the nearest
/// cell whose accumulation exceeds the single- or multi-catchment threshold, every cell draining
/// to it is collected, and that cell set is converted back to a polygon.
///
/// # Parameters
///
/// - `lat`, `lng`: the outlet as given by the user.
/// - `catchment`: polygon of the most downstream unit catchment, possibly multi-part.
/// - `is_single_catchment`: the whole watershed is this one unit catchment, so the lower
///   threshold applies.
/// - `flow_direction`, `accumulation`: the two grids.
/// - `config`: thresholds and polygon tolerance.
///
/// # Errors
///
/// Any [`DelineationError`]. For [`DelineationError::InvalidFlowGraph`] the snapped outlet is
/// attached, already nudged.
pub fn trace_upstream_catchment(
    lat: f64,
    lng: f64,
    catchment: &MultiPolygon<f64>,
    is_single_catchment: bool,
    flow_direction: &dyn RasterSource,
    accumulation: &dyn RasterSource,
    config: &DelineationConfig,
) -> Result<Refined, DelineationError> {
    let window = Window::around(catchment).ok_or(DelineationError::EmptyCatchment)?;
    let transform = window.transform();
    log::debug!("window {:?}, {:?} cells", window, window.shape());

    let mask = catchment_mask(catchment, &window).ok_or(DelineationError::EmptyCatchment)?;
    let mut fdir = flow_direction.read_flow_direction(&window)?;
    let mut acc = accumulation.read_accumulation(&window)?;
    apply_mask(&mut fdir, &mask);
    apply_mask(&mut acc, &mask);

    let threshold = config.thresholds.for_catchment(is_single_catchment);
    let snapped = snap_to_stream(&acc, &transform, lng, lat, threshold)?;
    let (lat_snap, lng_snap) = nudge_outlet(snapped.lat, snapped.lng);

    let cells = upstream_cells(&fdir, (snapped.row, snapped.col)).map_err(|e| match e {
        DelineationError::InvalidFlowGraph { row, col, .. } => DelineationError::InvalidFlowGraph {
            row,
            col,
            outlet: Some((lat_snap, lng_snap)),
        },
        other => other,
    })?;
    let polygon = polygonize(&cells, &transform, config.max_discarded_part_cells)?;

    Ok(Refined { polygon, lat: lat_snap, lng: lng_snap, cells: cells.len() })
}
