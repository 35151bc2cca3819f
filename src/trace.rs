//! Upstream tracing over an ESRI D8 flow direction grid.

use std::collections::VecDeque;

use ndarray::Array2;

use crate::error::DelineationError;

/// One of the eight ESRI D8 flow directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowDirection {
    East = 1,
    SouthEast = 2,
    South = 4,
    SouthWest = 8,
    West = 16,
    NorthWest = 32,
    North = 64,
    NorthEast = 128,
}

impl FlowDirection {
    pub const ALL: [FlowDirection; 8] = [
        FlowDirection::East,
        FlowDirection::SouthEast,
        FlowDirection::South,
        FlowDirection::SouthWest,
        FlowDirection::West,
        FlowDirection::NorthWest,
        FlowDirection::North,
        FlowDirection::NorthEast,
    ];

    /// `None` for `0` and every other value that is not a D8 code.
    pub fn from_code(code: u8) -> Option<Self> {
        FlowDirection::ALL.into_iter().find(|d| d.code() == code)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// `(row, col)` step to the downstream neighbour.
    pub fn offset(self) -> (isize, isize) {
        match self {
            FlowDirection::East => (0, 1),
            FlowDirection::SouthEast => (1, 1),
            FlowDirection::South => (1, 0),
            FlowDirection::SouthWest => (1, -1),
            FlowDirection::West => (0, -1),
            FlowDirection::NorthWest => (-1, -1),
            FlowDirection::North => (-1, 0),
            FlowDirection::NorthEast => (-1, 1),
        }
    }
}

/// Converts a raw raster value into a D8 code, `0` meaning no defined flow.
pub fn flow_code(value: f64) -> u8 {
    if value.fract() != 0.0 || !(1.0..=128.0).contains(&value) {
        return 0;
    }
    match FlowDirection::from_code(value as u8) {
        Some(d) => d.code(),
        None => 0,
    }
}

/// The cells of a grid that belong to one upstream area.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSet {
    cells: Array2<bool>,
    len: usize,
}

impl CellSet {
    /// Wraps a boolean grid, `true` marking members.
    pub fn from_grid(cells: Array2<bool>) -> Self {
        let len = cells.iter().filter(|&&c| c).count();
        CellSet { cells, len }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.cells.get((row, col)).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn grid(&self) -> &Array2<bool> {
        &self.cells
    }

    pub fn into_grid(self) -> Array2<bool> {
        self.cells
    }

    /// `(row, col)` of every member in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.indexed_iter().filter(|(_, c)| **c).map(|(idx, _)| idx)
    }
}

/// Finds every cell whose flow eventually reaches `seed`.
///
/// The walk starts at `seed` and repeatedly admits neighbours whose D8 code points at a cell
/// already admitted, using an explicit queue, so the depth of the drainage network never touches
/// the call stack. Cells with code `0` (including everything outside the catchment mask) have no
/// downstream neighbour and are never admitted, except the seed itself.
///
/// Hitting the window edge is not an error; the result is simply truncated there.
///
/// # Parameters
///
/// - `fdir`: D8 codes, `0` for cells without flow.
/// - `seed`: `(row, col)` of the pour point.
///
/// # Errors
///
/// [`DelineationError::InvalidFlowGraph`] if a cell is reached a second time, which only happens
/// when the flow directions loop back on themselves. [`DelineationError::EmptyTrace`] if the seed
/// lies outside the grid.
///
/// # Example
///
/// ```
/// use ndarray::array;
/// use upstream_refine::trace::upstream_cells;
///
/// // two cells draining east into the third
/// let fdir = array![[1u8, 1, 0]];
/// let upstream = upstream_cells(&fdir, (0, 2)).unwrap();
/// assert_eq!(upstream.len(), 3);
/// ```
pub fn upstream_cells(fdir: &Array2<u8>, seed: (usize, usize)) -> Result<CellSet, DelineationError> {
    let (rows, columns) = fdir.dim();
    if seed.0 >= rows || seed.1 >= columns {
        return Err(DelineationError::EmptyTrace);
    }

    let dx = [1, 1, 1, 0, -1, -1, -1, 0];
    let dy = [-1, 0, 1, 1, 1, 0, -1, -1];
    // code neighbour n must hold to drain into the centre cell
    let inflow: [u8; 8] = [8, 16, 32, 64, 128, 1, 2, 4];

    let mut visited = Array2::<bool>::from_elem((rows, columns), false);
    let mut queue = VecDeque::new();
    visited[seed] = true;
    queue.push_back(seed);
    let mut count = 1usize;

    while let Some((row, col)) = queue.pop_front() {
        for n in 0..8 {
            let rn = row as isize + dy[n];
            let cn = col as isize + dx[n];
            if rn < 0 || cn < 0 || rn >= rows as isize || cn >= columns as isize {
                continue;
            }
            let (rn, cn) = (rn as usize, cn as usize);
            if fdir[[rn, cn]] != inflow[n] {
                continue;
            }
            // each cell has a single outlet, so a second arrival means a loop
            if visited[[rn, cn]] {
                return Err(DelineationError::InvalidFlowGraph { row: rn, col: cn, outlet: None });
            }
            visited[[rn, cn]] = true;
            count += 1;
            queue.push_back((rn, cn));
        }
    }

    log::debug!("traced {count} cells upstream of {seed:?}");
    Ok(CellSet { cells: visited, len: count })
}
