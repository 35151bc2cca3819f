//! Turning the terminal catchment polygon into a cell mask and applying it to grids.

use geo::{Area, LineString, MultiPolygon, Polygon};
use ndarray::{Array2, Zip};
use num::Zero;

use crate::window::{GeoTransform, Window};

/// The part of a multi-part polygon with the largest area, `None` when there are no parts.
///
/// Extra parts of a unit catchment are pixel sized slivers, so dropping them loses nothing of
/// interest.
pub fn largest_part(polygons: &MultiPolygon<f64>) -> Option<&Polygon<f64>> {
    polygons
        .0
        .iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

/// The polygon rebuilt from its exterior ring alone.
pub fn fill_holes(polygon: &Polygon<f64>) -> Polygon<f64> {
    Polygon::new(polygon.exterior().clone(), vec![])
}

/// Marks every cell whose centre falls inside `polygon`.
///
/// Scanline fill with the even-odd rule over all rings, so holes stay unmarked. Each row is
/// sampled along its centre line and a cell is inside when its centre lies between a pair of
/// ring crossings.
///
/// # Parameters
///
/// - `polygon`: polygon in the same coordinates as `transform`.
/// - `transform`: affine transform of the target grid.
/// - `shape`: `(rows, cols)` of the target grid.
pub fn rasterize(polygon: &Polygon<f64>, transform: &GeoTransform, shape: (usize, usize)) -> Array2<bool> {
    let (rows, columns) = shape;
    let mut mask = Array2::<bool>::from_elem(shape, false);
    let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior()).chain(polygon.interiors()).collect();

    let mut crossings: Vec<f64> = Vec::new();
    for row in 0..rows {
        let (_, y) = transform.cell_center(row, 0);
        crossings.clear();
        for ring in &rings {
            for line in ring.lines() {
                let (p, q) = (line.start, line.end);
                if (p.y > y) != (q.y > y) {
                    crossings.push(p.x + (y - p.y) * (q.x - p.x) / (q.y - p.y));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);

        for pair in crossings.chunks_exact(2) {
            // columns whose centre x satisfies pair[0] <= x < pair[1]
            let first = ((pair[0] - transform.origin_x) / transform.pixel_width - 0.5).ceil();
            let last = ((pair[1] - transform.origin_x) / transform.pixel_width - 0.5).ceil();
            let first = first.clamp(0.0, columns as f64) as usize;
            let last = last.clamp(0.0, columns as f64) as usize;
            for col in first..last {
                mask[[row, col]] = true;
            }
        }
    }
    mask
}

/// Cell mask of a terminal catchment over `window`.
///
/// Keeps only the largest part of the catchment and ignores its holes before rasterizing.
/// Returns `None` if the catchment has no parts.
pub fn catchment_mask(catchment: &MultiPolygon<f64>, window: &Window) -> Option<Array2<bool>> {
    let filled = fill_holes(largest_part(catchment)?);
    Some(rasterize(&filled, &window.transform(), window.shape()))
}

/// Zeroes every cell of `grid` where `mask` is `false`.
///
/// # Panics
///
/// If `grid` and `mask` differ in shape.
pub fn apply_mask<T: Zero + Copy>(grid: &mut Array2<T>, mask: &Array2<bool>) {
    Zip::from(grid).and(mask).for_each(|v, &inside| {
        if !inside {
            *v = T::zero();
        }
    });
}
