//! # Upstream-refine
//!
//! `upstream-refine` does the pixel level part of a hybrid watershed delineation. Everything
//! upstream of the outlet's own unit catchment is assembled from vector polygons elsewhere; this
//! crate works out which part of that last, most downstream unit catchment actually drains to
//! the outlet, using 3 arc-second flow direction (ESRI D8) and flow accumulation grids.
//!
//! Only a window around the catchment is read, both grids are masked to the catchment, the outlet
//! is snapped to the nearest stream cell, the upstream cells are traced and the result is turned
//! back into a polygon.
//!
//! ## Example
//!
//! ```
//! use geo::{polygon, MultiPolygon};
//! use ndarray::Array2;
//! use upstream_refine::{trace_upstream_catchment, DelineationConfig, GeoTransform, InMemorySource, CELL_SIZE};
//!
//! // a 5x5 grid draining into the middle row, which runs east
//! let mut fdir = Array2::from_elem((5, 5), 64.0);
//! for r in 0..2 {
//!     fdir.row_mut(r).fill(4.0);
//! }
//! fdir.row_mut(2).fill(1.0);
//! let acc = Array2::from_shape_fn((5, 5), |(r, c)| if r == 2 { 600.0 * (c + 1) as f64 } else { 1.0 });
//!
//! let transform = GeoTransform::new(10.0, 45.0, CELL_SIZE, CELL_SIZE);
//! let fdir = InMemorySource::new(fdir, transform).expect("grid on the native resolution");
//! let acc = InMemorySource::new(acc, transform).expect("grid on the native resolution");
//!
//! let s = CELL_SIZE;
//! let catchment = MultiPolygon::new(vec![polygon![
//!     (x: 10.0, y: 45.0),
//!     (x: 10.0, y: 45.0 - 5.0 * s),
//!     (x: 10.0 + 5.0 * s, y: 45.0 - 5.0 * s),
//!     (x: 10.0 + 5.0 * s, y: 45.0),
//! ]]);
//!
//! let refined = trace_upstream_catchment(
//!     45.0 - 2.5 * s, 10.0 + 4.5 * s, &catchment, true, &fdir, &acc, &DelineationConfig::default(),
//! ).expect("outlet on the channel");
//! assert_eq!(refined.cells, 25);
//! ```

pub mod batch;
pub mod config;
pub mod delineate;
pub mod error;
pub mod features;
pub mod mask;
pub mod polygonize;
pub mod raster;
pub mod snap;
pub mod trace;
pub mod window;

pub use batch::{OutletRecord, OutletRequest, delineate_basins, delineate_batch};
pub use config::{ConfigError, DatasetPaths, DelineationConfig, Thresholds};
pub use delineate::{Refined, trace_upstream_catchment};
pub use error::DelineationError;
pub use raster::{GeoTiffSource, InMemorySource, RasterSource};
pub use trace::{CellSet, FlowDirection};
pub use window::{CELL_SIZE, GeoTransform, HALF_CELL, Window};
