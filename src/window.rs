use geo::{BoundingRect, Coord, MultiPolygon, Rect};

/// Native cell size of the flow direction and accumulation grids, 3 arc-seconds.
pub const CELL_SIZE: f64 = 1.0 / 1200.0;

/// Half of [`CELL_SIZE`].
pub const HALF_CELL: f64 = CELL_SIZE / 2.0;

/// Affine mapping between grid indices and geographic coordinates.
///
/// North-up only: `origin_x`/`origin_y` is the top-left corner of cell `(0, 0)`, columns grow
/// east by `pixel_width` and rows grow south by `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform { origin_x, origin_y, pixel_width, pixel_height }
    }

    /// `(lng, lat)` of the centre of cell `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Coordinate of the cell corner shared by rows `row - 1, row` and columns `col - 1, col`.
    pub fn vertex(&self, row: usize, col: usize) -> Coord<f64> {
        Coord {
            x: self.origin_x + col as f64 * self.pixel_width,
            y: self.origin_y - row as f64 * self.pixel_height,
        }
    }

    /// Fractional `(row, col)` of a coordinate, measured so that cell centres fall on integers.
    pub fn fractional_cell(&self, lng: f64, lat: f64) -> (f64, f64) {
        (
            (self.origin_y - lat) / self.pixel_height - 0.5,
            (lng - self.origin_x) / self.pixel_width - 0.5,
        )
    }
}

/// A pixel aligned bounding box, `(xmin, ymin, xmax, ymax)` in degrees.
///
/// The bounds sit on the centres of the outermost cells, so a window of `n` cells across spans
/// `(n - 1) * CELL_SIZE` degrees between `xmin` and `xmax`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Window {
    /// Aligns a bounding box to the native grid.
    ///
    /// Each edge is rounded outward to a whole multiple of [`CELL_SIZE`] and then pushed out by a
    /// further half cell, which places it on a cell centre of the underlying dataset. The result
    /// always contains `bounds` with at least half a cell to spare.
    ///
    /// # Example
    ///
    /// ```
    /// use geo::{coord, Rect};
    /// use upstream_refine::window::{Window, CELL_SIZE, HALF_CELL};
    ///
    /// let w = Window::aligned(Rect::new(coord! { x: 10.0001, y: 45.0001 }, coord! { x: 10.0041, y: 45.0041 }));
    /// assert!((w.xmin - (10.0 - HALF_CELL)).abs() < 1e-9);
    /// assert!((w.xmax - (10.0 + 5.0 * CELL_SIZE + HALF_CELL)).abs() < 1e-9);
    /// ```
    pub fn aligned(bounds: Rect<f64>) -> Self {
        let (min, max) = (bounds.min(), bounds.max());
        Window {
            xmin: (min.x / CELL_SIZE).floor() * CELL_SIZE - HALF_CELL,
            ymin: (min.y / CELL_SIZE).floor() * CELL_SIZE - HALF_CELL,
            xmax: (max.x / CELL_SIZE).ceil() * CELL_SIZE + HALF_CELL,
            ymax: (max.y / CELL_SIZE).ceil() * CELL_SIZE + HALF_CELL,
        }
    }

    /// Aligned window around a catchment polygon, `None` for an empty geometry.
    pub fn around(catchment: &MultiPolygon<f64>) -> Option<Self> {
        catchment.bounding_rect().map(Window::aligned)
    }

    /// `(rows, cols)` of the grid whose cell centres span this window.
    pub fn shape(&self) -> (usize, usize) {
        let rows = ((self.ymax - self.ymin) / CELL_SIZE).round() as usize + 1;
        let cols = ((self.xmax - self.xmin) / CELL_SIZE).round() as usize + 1;
        (rows, cols)
    }

    /// Affine transform of the window's grid.
    pub fn transform(&self) -> GeoTransform {
        GeoTransform::new(self.xmin - HALF_CELL, self.ymax + HALF_CELL, CELL_SIZE, CELL_SIZE)
    }

    pub fn contains(&self, bounds: &Rect<f64>) -> bool {
        self.xmin <= bounds.min().x
            && self.ymin <= bounds.min().y
            && self.xmax >= bounds.max().x
            && self.ymax >= bounds.max().y
    }
}
