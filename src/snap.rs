//! Moving an outlet onto the nearest stream cell.

use ndarray::Array2;

use crate::error::DelineationError;
use crate::window::GeoTransform;

/// A pour point snapped to a stream cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedOutlet {
    pub row: usize,
    pub col: usize,
    /// Longitude of the cell's north-west corner.
    pub lng: f64,
    /// Latitude of the cell's north-west corner.
    pub lat: f64,
    /// Distance moved, in cells.
    pub distance: f64,
}

/// Cells whose accumulation is strictly above `threshold`.
pub fn stream_cells(accumulation: &Array2<f64>, threshold: u32) -> Array2<bool> {
    let threshold = f64::from(threshold);
    accumulation.mapv(|a| a > threshold)
}

/// Snaps `(lng, lat)` to the closest stream cell.
///
/// Cells are located by their north-west corner, and that corner is what gets reported; shift it
/// with [`crate::polygonize::nudge_outlet`] to reach the cell centre. Distance is measured in grid
/// space. On a tie the first cell in row-major order wins, so snapping a snapped point returns the
/// same cell.
///
/// `accumulation` should already be masked to the catchment, otherwise the outlet can jump to a
/// river in the neighbouring basin.
///
/// # Errors
///
/// [`DelineationError::NoStreamFound`] if no cell exceeds `threshold`.
pub fn snap_to_stream(
    accumulation: &Array2<f64>,
    transform: &GeoTransform,
    lng: f64,
    lat: f64,
    threshold: u32,
) -> Result<SnappedOutlet, DelineationError> {
    let streams = stream_cells(accumulation, threshold);
    let (target_row, target_col) = transform.fractional_cell(lng, lat);
    // corners sit half a cell before the centres
    let (target_row, target_col) = (target_row + 0.5, target_col + 0.5);

    let mut best: Option<(usize, usize, f64)> = None;
    for ((row, col), _) in streams.indexed_iter().filter(|(_, s)| **s) {
        let dr = row as f64 - target_row;
        let dc = col as f64 - target_col;
        let d2 = dr * dr + dc * dc;
        if best.is_none_or(|(_, _, b)| d2 < b) {
            best = Some((row, col, d2));
        }
    }

    let (row, col, d2) = best.ok_or(DelineationError::NoStreamFound { threshold })?;
    let corner = transform.vertex(row, col);
    let (lng_snap, lat_snap) = (corner.x, corner.y);
    log::debug!(
        "snapped ({lng}, {lat}) to cell ({row}, {col}) at ({lng_snap}, {lat_snap}), {:.2} cells away",
        d2.sqrt()
    );
    Ok(SnappedOutlet { row, col, lng: lng_snap, lat: lat_snap, distance: d2.sqrt() })
}
