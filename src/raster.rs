//! Windowed, read-only access to the flow direction and accumulation grids.
//!
//! Both grids are persistent datasets at [`CELL_SIZE`] resolution. A read returns exactly the
//! cells of a [`Window`], zero filled wherever the dataset has no data.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndarray::{Array2, s};
use num::ToPrimitive;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::error::DelineationError;
use crate::trace::flow_code;
use crate::window::{CELL_SIZE, GeoTransform, Window};

/// Tolerated difference between a dataset's pixel size and [`CELL_SIZE`].
const RESOLUTION_EPSILON: f64 = 1e-9;

/// A gridded dataset that can be read one window at a time.
///
/// Implementations must be safe to read from several threads at once; nothing is written
/// during delineation.
pub trait RasterSource: Send + Sync {
    /// Raw values for every cell centre in `window`, `0.0` where there is no data.
    fn read_window(&self, window: &Window) -> Result<Array2<f64>, DelineationError>;

    /// ESRI D8 codes for the window, anything outside `{1, 2, 4, ..., 128}` becomes `0`.
    fn read_flow_direction(&self, window: &Window) -> Result<Array2<u8>, DelineationError> {
        Ok(self.read_window(window)?.mapv(flow_code))
    }

    /// Upstream cell counts for the window, negative values become `0`.
    fn read_accumulation(&self, window: &Window) -> Result<Array2<f64>, DelineationError> {
        Ok(self.read_window(window)?.mapv(|v| if v > 0.0 { v } else { 0.0 }))
    }
}

/// Where a window lands inside a dataset of `width` x `height` cells.
#[derive(Debug, Clone, Copy)]
struct Placement {
    row_off: isize,
    col_off: isize,
    rows: (usize, usize),
    cols: (usize, usize),
}

impl Placement {
    fn new(
        window: &Window,
        transform: &GeoTransform,
        width: usize,
        height: usize,
    ) -> Result<Self, DelineationError> {
        let target = window.transform();
        let (nrows, ncols) = window.shape();
        let col_off = ((target.origin_x - transform.origin_x) / transform.pixel_width).round() as isize;
        let row_off = ((transform.origin_y - target.origin_y) / transform.pixel_height).round() as isize;

        let clamp = |v: isize, max: usize| v.clamp(0, max as isize) as usize;
        let rows = (clamp(row_off, height), clamp(row_off + nrows as isize, height));
        let cols = (clamp(col_off, width), clamp(col_off + ncols as isize, width));
        if rows.0 >= rows.1 || cols.0 >= cols.1 {
            return Err(DelineationError::WindowOutOfBounds { window: *window });
        }
        Ok(Placement { row_off, col_off, rows, cols })
    }

    /// Index in the output window of dataset cell `(row, col)`.
    fn target(&self, row: usize, col: usize) -> (usize, usize) {
        (
            (row as isize - self.row_off) as usize,
            (col as isize - self.col_off) as usize,
        )
    }
}

fn check_resolution(path: &Path, transform: &GeoTransform) -> Result<(), DelineationError> {
    if (transform.pixel_width - CELL_SIZE).abs() > RESOLUTION_EPSILON
        || (transform.pixel_height - CELL_SIZE).abs() > RESOLUTION_EPSILON
    {
        return Err(DelineationError::DatasetUnavailable {
            path: path.to_path_buf(),
            reason: format!(
                "pixel size {} x {} does not match the native 1/1200 degree grid",
                transform.pixel_width, transform.pixel_height
            ),
        });
    }
    Ok(())
}

fn unavailable(path: &Path, reason: impl ToString) -> DelineationError {
    DelineationError::DatasetUnavailable { path: path.to_path_buf(), reason: reason.to_string() }
}

/// A single band GeoTIFF on disk.
///
/// Only the header is kept in memory. Every read reopens the file and decodes just the strips
/// or tiles overlapping the window, so one source can serve many threads.
#[derive(Debug, Clone)]
pub struct GeoTiffSource {
    path: PathBuf,
    width: usize,
    height: usize,
    transform: GeoTransform,
    nodata: Option<f64>,
}

impl GeoTiffSource {
    /// Reads the GeoTIFF header of `path`.
    ///
    /// The georeferencing comes from `ModelPixelScale` and `ModelTiepoint`, the nodata value
    /// from the GDAL nodata tag when present.
    ///
    /// # Errors
    ///
    /// [`DelineationError::DatasetUnavailable`] if the file cannot be opened, is not a georeferenced
    /// TIFF, or is not on the 1/1200 degree grid.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DelineationError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| unavailable(path, e))?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| unavailable(path, e))?;
        let (width, height) = decoder.dimensions().map_err(|e| unavailable(path, e))?;

        let scale = decoder
            .get_tag_f64_vec(Tag::ModelPixelScaleTag)
            .map_err(|e| unavailable(path, format!("missing pixel scale: {e}")))?;
        let tiepoint = decoder
            .get_tag_f64_vec(Tag::ModelTiepointTag)
            .map_err(|e| unavailable(path, format!("missing tiepoint: {e}")))?;
        if scale.len() < 2 || tiepoint.len() < 6 {
            return Err(unavailable(path, "malformed georeferencing tags"));
        }
        // tiepoint is (i, j, k, x, y, z): raster cell (i, j) sits at map (x, y)
        let transform = GeoTransform::new(
            tiepoint[3] - tiepoint[0] * scale[0],
            tiepoint[4] + tiepoint[1] * scale[1],
            scale[0],
            scale[1],
        );
        check_resolution(path, &transform)?;

        let nodata = match decoder.get_tag_ascii_string(Tag::GdalNodata) {
            Ok(text) => text.trim_matches(char::from(0)).trim().parse::<f64>().ok(),
            Err(_) => None,
        };

        log::debug!(
            "opened {:?}: {}x{} cells, origin ({}, {}), nodata {:?}",
            path, width, height, transform.origin_x, transform.origin_y, nodata
        );
        Ok(GeoTiffSource {
            path: path.to_path_buf(),
            width: width as usize,
            height: height as usize,
            transform,
            nodata,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    /// `(rows, cols)` of the whole dataset.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

impl RasterSource for GeoTiffSource {
    fn read_window(&self, window: &Window) -> Result<Array2<f64>, DelineationError> {
        let place = Placement::new(window, &self.transform, self.width, self.height)?;
        let path = self.path.as_path();
        let file = File::open(path).map_err(|e| unavailable(path, e))?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| unavailable(path, e))?;

        let (chunk_w, chunk_h) = decoder.chunk_dimensions();
        let (chunk_w, chunk_h) = (chunk_w as usize, chunk_h as usize);
        let chunks_across = self.width.div_ceil(chunk_w);

        let mut out = Array2::<f64>::zeros(window.shape());
        for chunk_row in place.rows.0 / chunk_h..=(place.rows.1 - 1) / chunk_h {
            for chunk_col in place.cols.0 / chunk_w..=(place.cols.1 - 1) / chunk_w {
                let index = (chunk_row * chunks_across + chunk_col) as u32;
                let (data_w, data_h) = decoder.chunk_data_dimensions(index);
                let (data_w, data_h) = (data_w as usize, data_h as usize);
                let chunk = decoder.read_chunk(index).map_err(|e| unavailable(path, e))?;
                let values = samples(chunk).ok_or_else(|| unavailable(path, "unsupported sample format"))?;
                if values.len() != data_w * data_h {
                    return Err(unavailable(path, "only single band rasters are supported"));
                }

                for y in 0..data_h {
                    let row = chunk_row * chunk_h + y;
                    if row < place.rows.0 || row >= place.rows.1 {
                        continue;
                    }
                    for x in 0..data_w {
                        let col = chunk_col * chunk_w + x;
                        if col < place.cols.0 || col >= place.cols.1 {
                            continue;
                        }
                        let v = values[y * data_w + x];
                        if !v.is_finite() || Some(v) == self.nodata {
                            continue;
                        }
                        out[place.target(row, col)] = v;
                    }
                }
            }
        }
        Ok(out)
    }
}

fn to_f64<T: ToPrimitive>(values: Vec<T>) -> Vec<f64> {
    values.into_iter().map(|v| v.to_f64().unwrap_or(f64::NAN)).collect()
}

/// Widens any decoded sample buffer to `f64`.
fn samples(chunk: DecodingResult) -> Option<Vec<f64>> {
    #[allow(unreachable_patterns)]
    let values = match chunk {
        DecodingResult::U8(v) => to_f64(v),
        DecodingResult::U16(v) => to_f64(v),
        DecodingResult::U32(v) => to_f64(v),
        DecodingResult::U64(v) => to_f64(v),
        DecodingResult::I8(v) => to_f64(v),
        DecodingResult::I16(v) => to_f64(v),
        DecodingResult::I32(v) => to_f64(v),
        DecodingResult::I64(v) => to_f64(v),
        DecodingResult::F32(v) => to_f64(v),
        DecodingResult::F64(v) => v,
        _ => return None,
    };
    Some(values)
}

/// A grid already held in memory, windowed exactly like [`GeoTiffSource`].
#[derive(Debug, Clone)]
pub struct InMemorySource {
    data: Array2<f64>,
    transform: GeoTransform,
    nodata: Option<f64>,
}

impl InMemorySource {
    /// Wraps `data` whose cell `(0, 0)` has its top-left corner at `transform`'s origin.
    ///
    /// # Errors
    ///
    /// [`DelineationError::DatasetUnavailable`] if the pixel size is not [`CELL_SIZE`].
    pub fn new(data: Array2<f64>, transform: GeoTransform) -> Result<Self, DelineationError> {
        check_resolution(Path::new("<memory>"), &transform)?;
        Ok(InMemorySource { data, transform, nodata: None })
    }

    /// Treats `nodata` as missing, it reads back as `0`.
    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }
}

impl RasterSource for InMemorySource {
    fn read_window(&self, window: &Window) -> Result<Array2<f64>, DelineationError> {
        let (height, width) = self.data.dim();
        let place = Placement::new(window, &self.transform, width, height)?;
        let (top, left) = place.target(place.rows.0, place.cols.0);
        let (bottom, right) = place.target(place.rows.1, place.cols.1);

        let mut out = Array2::<f64>::zeros(window.shape());
        out.slice_mut(s![top..bottom, left..right])
            .assign(&self.data.slice(s![place.rows.0..place.rows.1, place.cols.0..place.cols.1]));
        if let Some(nodata) = self.nodata {
            out.mapv_inplace(|v| if v == nodata { 0.0 } else { v });
        }
        out.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
        Ok(out)
    }
}
