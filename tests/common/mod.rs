#![allow(dead_code)]

use std::fs::File;
use std::path::Path;

use anyhow::Result;
use geo::{LineString, MultiPolygon, Polygon};
use ndarray::Array2;
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;
use upstream_refine::{CELL_SIZE, GeoTransform};

pub const ORIGIN_X: f64 = 10.0;
pub const ORIGIN_Y: f64 = 45.0;

pub fn transform() -> GeoTransform {
    GeoTransform::new(ORIGIN_X, ORIGIN_Y, CELL_SIZE, CELL_SIZE)
}

/// Polygon covering cells `rows.0..rows.1` x `cols.0..cols.1` of [`transform`], on the cell edges.
pub fn cell_block(rows: (usize, usize), cols: (usize, usize)) -> Polygon<f64> {
    let t = transform();
    Polygon::new(
        LineString::new(vec![
            t.vertex(rows.0, cols.0),
            t.vertex(rows.1, cols.0),
            t.vertex(rows.1, cols.1),
            t.vertex(rows.0, cols.1),
            t.vertex(rows.0, cols.0),
        ]),
        vec![],
    )
}

pub fn multi(polygon: Polygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon])
}

/// `(lat, lng)` of the centre of cell `(row, col)` of [`transform`].
pub fn center(row: usize, col: usize) -> (f64, f64) {
    let (lng, lat) = transform().cell_center(row, col);
    (lat, lng)
}

/// Writes D8 codes as an 8 bit GeoTIFF in strips of `rows_per_strip`, with 255 as nodata.
pub fn write_flow_direction(path: &Path, grid: &Array2<u8>, rows_per_strip: u32) -> Result<()> {
    let (rows, cols) = grid.dim();
    let mut encoder = TiffEncoder::new(File::create(path)?)?;
    let mut image = encoder.new_image::<colortype::Gray8>(cols as u32, rows as u32)?;
    image.encoder().write_tag(Tag::ModelPixelScaleTag, &[CELL_SIZE, CELL_SIZE, 0.0][..])?;
    image.encoder().write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, ORIGIN_X, ORIGIN_Y, 0.0][..])?;
    image.encoder().write_tag(Tag::GdalNodata, "255")?;
    image.rows_per_strip(rows_per_strip)?;
    let data: Vec<u8> = grid.iter().copied().collect();
    image.write_data(&data)?;
    Ok(())
}

/// Writes accumulation as a 32 bit float GeoTIFF in strips of `rows_per_strip`.
pub fn write_accumulation(path: &Path, grid: &Array2<f64>, rows_per_strip: u32) -> Result<()> {
    let (rows, cols) = grid.dim();
    let mut encoder = TiffEncoder::new(File::create(path)?)?;
    let mut image = encoder.new_image::<colortype::Gray32Float>(cols as u32, rows as u32)?;
    image.encoder().write_tag(Tag::ModelPixelScaleTag, &[CELL_SIZE, CELL_SIZE, 0.0][..])?;
    image.encoder().write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, ORIGIN_X, ORIGIN_Y, 0.0][..])?;
    image.rows_per_strip(rows_per_strip)?;
    let data: Vec<f32> = grid.iter().map(|&v| v as f32).collect();
    image.write_data(&data)?;
    Ok(())
}

/// Ten cell channel running east along row 1 of a 3 x 10 grid, accumulation 1..=10 downstream.
/// Rows 0 and 2 have no flow and no accumulation.
pub fn straight_channel() -> (Array2<u8>, Array2<f64>) {
    let mut fdir = Array2::<u8>::zeros((3, 10));
    let mut acc = Array2::<f64>::zeros((3, 10));
    for c in 0..10 {
        fdir[[1, c]] = 1;
        acc[[1, c]] = (c + 1) as f64;
    }
    (fdir, acc)
}

/// Writes D8 codes as an uncompressed 8 bit GeoTIFF in `tile` x `tile` tiles, with 255 as nodata.
///
/// The tiff encoder only writes strips, so the file is laid out by hand: tile data, then the
/// out-of-line tag values, then a single IFD. Edge tiles are padded with nodata.
pub fn write_tiled_flow_direction(path: &Path, grid: &Array2<u8>, tile: usize) -> Result<()> {
    let (rows, cols) = grid.dim();
    let (across, down) = (cols.div_ceil(tile), rows.div_ceil(tile));
    let count = across * down;
    assert!(tile % 16 == 0 && count > 1, "tiles must be multiples of 16 and more than one");

    let mut data = Vec::with_capacity(count * tile * tile);
    for tile_row in 0..down {
        for tile_col in 0..across {
            for y in 0..tile {
                for x in 0..tile {
                    let (r, c) = (tile_row * tile + y, tile_col * tile + x);
                    data.push(if r < rows && c < cols { grid[[r, c]] } else { 255 });
                }
            }
        }
    }

    let offsets_at = 8 + data.len();
    let counts_at = offsets_at + 4 * count;
    let scale_at = counts_at + 4 * count;
    let tiepoint_at = scale_at + 3 * 8;
    let ifd_at = tiepoint_at + 6 * 8;

    let mut out: Vec<u8> = Vec::new();
    out.extend(b"II");
    out.extend(42u16.to_le_bytes());
    out.extend((ifd_at as u32).to_le_bytes());
    out.extend(&data);
    for i in 0..count {
        out.extend(((8 + i * tile * tile) as u32).to_le_bytes());
    }
    for _ in 0..count {
        out.extend(((tile * tile) as u32).to_le_bytes());
    }
    for v in [CELL_SIZE, CELL_SIZE, 0.0] {
        out.extend(v.to_le_bytes());
    }
    for v in [0.0, 0.0, 0.0, ORIGIN_X, ORIGIN_Y, 0.0] {
        out.extend(v.to_le_bytes());
    }

    const ASCII: u16 = 2;
    const SHORT: u16 = 3;
    const LONG: u16 = 4;
    const DOUBLE: u16 = 12;
    let short = |v: u16| {
        let mut b = [0u8; 4];
        b[..2].copy_from_slice(&v.to_le_bytes());
        b
    };
    let long = |v: usize| (v as u32).to_le_bytes();
    // sorted by tag number
    let entries: [(u16, u16, u32, [u8; 4]); 14] = [
        (256, LONG, 1, long(cols)),
        (257, LONG, 1, long(rows)),
        (258, SHORT, 1, short(8)),
        (259, SHORT, 1, short(1)),
        (262, SHORT, 1, short(1)),
        (277, SHORT, 1, short(1)),
        (322, LONG, 1, long(tile)),
        (323, LONG, 1, long(tile)),
        (324, LONG, count as u32, long(offsets_at)),
        (325, LONG, count as u32, long(counts_at)),
        (339, SHORT, 1, short(1)),
        (33550, DOUBLE, 3, long(scale_at)),
        (33922, DOUBLE, 6, long(tiepoint_at)),
        (42113, ASCII, 4, *b"255\0"),
    ];
    out.extend((entries.len() as u16).to_le_bytes());
    for (tag, kind, n, value) in entries {
        out.extend(tag.to_le_bytes());
        out.extend(kind.to_le_bytes());
        out.extend(n.to_le_bytes());
        out.extend(value);
    }
    out.extend(0u32.to_le_bytes());
    std::fs::write(path, out)?;
    Ok(())
}
