//! Converting a traced cell set back into a single polygon.

use std::collections::{HashMap, VecDeque};

use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use ndarray::Array2;

use crate::error::DelineationError;
use crate::trace::CellSet;
use crate::window::{GeoTransform, HALF_CELL};

/// A closed boundary traced along cell edges.
///
/// Vertices are grid corners as `(row, col)`, with only the corners where the boundary turns
/// kept. Exterior rings run counter-clockwise on the map and have a positive area, holes run
/// clockwise and have a negative one.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    /// 4-connected component the ring bounds.
    pub component: usize,
    pub vertices: Vec<(usize, usize)>,
    /// Signed area in cells.
    pub area: f64,
}

impl Ring {
    pub fn is_exterior(&self) -> bool {
        self.area > 0.0
    }

    fn to_line_string(&self, transform: &GeoTransform) -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = self.vertices.iter().map(|&(r, c)| transform.vertex(r, c)).collect();
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
        LineString::new(coords)
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: (usize, usize),
    to: (usize, usize),
    component: usize,
}

impl Edge {
    fn direction(&self) -> (isize, isize) {
        (
            self.to.0 as isize - self.from.0 as isize,
            self.to.1 as isize - self.from.1 as isize,
        )
    }
}

/// Quarter turn to the left on the map (north up), in `(row, col)` steps.
fn turn_left(d: (isize, isize)) -> (isize, isize) {
    (-d.1, d.0)
}

/// Labels 4-connected components of `true` cells, `usize::MAX` for background.
fn label_components(cells: &Array2<bool>) -> (Array2<usize>, usize) {
    let (rows, columns) = cells.dim();
    let dx = [1, 0, -1, 0];
    let dy = [0, 1, 0, -1];
    let mut labels = Array2::<usize>::from_elem((rows, columns), usize::MAX);
    let mut queue = VecDeque::new();
    let mut count = 0;

    for ((row, col), &inside) in cells.indexed_iter() {
        if !inside || labels[[row, col]] != usize::MAX {
            continue;
        }
        labels[[row, col]] = count;
        queue.push_back((row, col));
        while let Some((r, c)) = queue.pop_front() {
            for n in 0..4 {
                let rn = r as isize + dy[n];
                let cn = c as isize + dx[n];
                if rn < 0 || cn < 0 || rn >= rows as isize || cn >= columns as isize {
                    continue;
                }
                let (rn, cn) = (rn as usize, cn as usize);
                if cells[[rn, cn]] && labels[[rn, cn]] == usize::MAX {
                    labels[[rn, cn]] = count;
                    queue.push_back((rn, cn));
                }
            }
        }
        count += 1;
    }
    (labels, count)
}

/// Traces every boundary of the `true` regions of `cells`.
///
/// Each exposed cell side becomes a directed edge with the cell on its left. Edges are then
/// chained end to start. Where two cells touch only at a corner the chain turns left, which keeps
/// diagonal neighbours in separate rings.
pub fn trace_rings(cells: &Array2<bool>) -> Vec<Ring> {
    let (rows, columns) = cells.dim();
    let (labels, _) = label_components(cells);
    let outside = |r: isize, c: isize| {
        r < 0 || c < 0 || r >= rows as isize || c >= columns as isize || !cells[[r as usize, c as usize]]
    };

    let mut edges: Vec<Edge> = Vec::new();
    for ((r, c), &inside) in cells.indexed_iter() {
        if !inside {
            continue;
        }
        let component = labels[[r, c]];
        let (ri, ci) = (r as isize, c as isize);
        if outside(ri + 1, ci) {
            edges.push(Edge { from: (r + 1, c), to: (r + 1, c + 1), component });
        }
        if outside(ri, ci + 1) {
            edges.push(Edge { from: (r + 1, c + 1), to: (r, c + 1), component });
        }
        if outside(ri - 1, ci) {
            edges.push(Edge { from: (r, c + 1), to: (r, c), component });
        }
        if outside(ri, ci - 1) {
            edges.push(Edge { from: (r, c), to: (r + 1, c), component });
        }
    }

    let mut by_start: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        by_start.entry(e.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut vertices = vec![edges[start].from];
        let mut current = start;
        loop {
            used[current] = true;
            let edge = edges[current];
            let dir = edge.direction();
            let Some(candidates) = by_start.get(&edge.to) else {
                break;
            };
            let next = candidates
                .iter()
                .copied()
                .find(|&i| edges[i].direction() == turn_left(dir))
                .or_else(|| candidates.iter().copied().find(|&i| !used[i] || i == start));
            let Some(next) = next else {
                break;
            };
            if next == start {
                break;
            }
            if used[next] {
                log::warn!("boundary chain re-entered edge {next}, ring left open");
                break;
            }
            if edges[next].direction() != dir {
                vertices.push(edge.to);
            }
            current = next;
        }
        if edges[current].direction() == edges[start].direction() && vertices.len() > 1 {
            vertices.remove(0);
        }

        let area = signed_area(&vertices);
        rings.push(Ring { component: edges[start].component, vertices, area });
    }
    rings
}

/// Shoelace area with rows pointing south, so counter-clockwise on the map is positive.
fn signed_area(vertices: &[(usize, usize)]) -> f64 {
    let n = vertices.len();
    let mut twice = 0.0;
    for i in 0..n {
        let (r0, c0) = vertices[i];
        let (r1, c1) = vertices[(i + 1) % n];
        let (x0, y0) = (c0 as f64, -(r0 as f64));
        let (x1, y1) = (c1 as f64, -(r1 as f64));
        twice += x0 * y1 - x1 * y0;
    }
    twice / 2.0
}

/// One polygon per 4-connected component of `cells`, holes included.
pub fn component_polygons(cells: &Array2<bool>, transform: &GeoTransform) -> MultiPolygon<f64> {
    let mut exteriors: HashMap<usize, LineString<f64>> = HashMap::new();
    let mut holes: HashMap<usize, Vec<LineString<f64>>> = HashMap::new();
    for ring in trace_rings(cells) {
        let line = ring.to_line_string(transform);
        if ring.is_exterior() {
            exteriors.insert(ring.component, line);
        } else {
            holes.entry(ring.component).or_default().push(line);
        }
    }

    let mut components: Vec<usize> = exteriors.keys().copied().collect();
    components.sort_unstable();
    let polygons = components
        .into_iter()
        .filter_map(|k| {
            let exterior = exteriors.remove(&k)?;
            Some(Polygon::new(exterior, holes.remove(&k).unwrap_or_default()))
        })
        .collect();
    MultiPolygon::new(polygons)
}

/// Dissolves the parts into as few polygons as their geometry allows.
pub fn dissolve(parts: MultiPolygon<f64>) -> MultiPolygon<f64> {
    if parts.0.len() < 2 {
        return parts;
    }
    let mut polygons = parts.0.into_iter();
    let first = MultiPolygon::new(polygons.next().into_iter().collect());
    polygons.fold(first, |acc, p| acc.union(&MultiPolygon::new(vec![p])))
}

/// Keeps the largest polygon of `parts`.
///
/// With `tolerance` set, fails instead if any discarded part covers more than `tolerance` cells
/// of `cell_area` each.
///
/// # Errors
///
/// [`DelineationError::EmptyTrace`] for no parts, [`DelineationError::FragmentedResult`] when the
/// tolerance is exceeded.
pub fn select_largest(
    parts: MultiPolygon<f64>,
    cell_area: f64,
    tolerance: Option<f64>,
) -> Result<Polygon<f64>, DelineationError> {
    let mut parts = parts.0;
    parts.sort_by(|a, b| b.unsigned_area().total_cmp(&a.unsigned_area()));
    let mut parts = parts.into_iter();
    let largest = parts.next().ok_or(DelineationError::EmptyTrace)?;

    for discarded in parts {
        let cells = discarded.unsigned_area() / cell_area;
        if let Some(tolerance) = tolerance {
            if cells > tolerance {
                return Err(DelineationError::FragmentedResult { discarded_cells: cells, tolerance });
            }
        }
        log::warn!("discarding a {cells:.1} cell polygon part");
    }
    Ok(largest)
}

/// Turns a traced cell set into one polygon on the grid's cell edges.
///
/// The boundary of every component is traced, the parts are dissolved, and if more than one
/// disjoint piece remains only the largest is returned (see [`select_largest`]).
///
/// # Errors
///
/// [`DelineationError::EmptyTrace`] for an empty cell set, [`DelineationError::FragmentedResult`]
/// from [`select_largest`].
pub fn polygonize(
    cells: &CellSet,
    transform: &GeoTransform,
    tolerance: Option<f64>,
) -> Result<Polygon<f64>, DelineationError> {
    if cells.is_empty() {
        return Err(DelineationError::EmptyTrace);
    }
    let parts = component_polygons(cells.grid(), transform);
    let parts = dissolve(parts);
    if parts.0.len() > 1 {
        log::debug!("cell set dissolved into {} disjoint parts", parts.0.len());
    }
    select_largest(parts, transform.pixel_width * transform.pixel_height, tolerance)
}

/// Shifts a snapped outlet half a cell east and half a cell south, `(lat, lng)` in and out.
///
/// Moves the north-west corner reported by [`crate::snap::snap_to_stream`] onto the cell centre,
/// which lines the outlet up with the vector river centrelines the rest of the watershed is built
/// from. The shift is the same everywhere on the globe.
pub fn nudge_outlet(lat: f64, lng: f64) -> (f64, f64) {
    (lat - HALF_CELL, lng + HALF_CELL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn single_cell_is_one_square() {
        let rings = trace_rings(&array![[true]]);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].vertices.len(), 4);
        assert_eq!(rings[0].area, 1.0);
    }

    #[test]
    fn straight_runs_collapse_to_corners() {
        let rings = trace_rings(&array![[true, true, true], [true, true, true]]);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].vertices.len(), 4);
        assert_eq!(rings[0].area, 6.0);
    }

    #[test]
    fn diagonal_cells_stay_apart() {
        let rings = trace_rings(&array![[true, false], [false, true]]);
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|r| r.area == 1.0 && r.vertices.len() == 4));
        assert_ne!(rings[0].component, rings[1].component);
    }

    #[test]
    fn ring_of_cells_has_a_hole() {
        let cells = array![
            [true, true, true],
            [true, false, true],
            [true, true, true],
        ];
        let mut areas: Vec<f64> = trace_rings(&cells).iter().map(|r| r.area).collect();
        areas.sort_by(f64::total_cmp);
        assert_eq!(areas, vec![-1.0, 9.0]);
    }

    #[test]
    fn l_shape_keeps_six_corners() {
        let rings = trace_rings(&array![[true, false], [true, true]]);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].vertices.len(), 6);
        assert_eq!(rings[0].area, 3.0);
    }
}
