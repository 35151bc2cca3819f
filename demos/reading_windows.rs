use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use geo::{Rect, coord};
use ndarray::Array2;
use tempfile::NamedTempFile;
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;
use upstream_refine::{CELL_SIZE, GeoTiffSource, RasterSource, Window};

fn main() -> Result<()> {
    let (rows, cols) = (40usize, 30usize);
    let codes = [1u8, 2, 4, 8, 16, 32, 64, 128];
    let fdir: Array2<u8> = Array2::from_shape_fn((rows, cols), |(r, c)| codes[(r + c) % 8]);

    let tmp = NamedTempFile::new()?;
    let ofn: PathBuf = tmp.path().to_path_buf();
    println!("Writing a {rows}x{cols} flow direction grid to {:?}", ofn);
    let mut encoder = TiffEncoder::new(File::create(&ofn)?)?;
    let mut image = encoder.new_image::<colortype::Gray8>(cols as u32, rows as u32)?;
    image.encoder().write_tag(Tag::ModelPixelScaleTag, &[CELL_SIZE, CELL_SIZE, 0.0][..])?;
    image.encoder().write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, -60.0, -5.0, 0.0][..])?;
    image.encoder().write_tag(Tag::GdalNodata, "255")?;
    image.rows_per_strip(8)?;
    let data: Vec<u8> = fdir.iter().copied().collect();
    image.write_data(&data)?;

    let source = GeoTiffSource::open(&ofn)?;
    println!("Opened {:?}, {:?} cells, {:?}", source.path(), source.shape(), source.transform());

    // a catchment's bounding box near the south-east corner, partly off the grid
    let s = CELL_SIZE;
    let bounds = Rect::new(
        coord! { x: -60.0 + 24.3 * s, y: -5.0 - 44.0 * s },
        coord! { x: -60.0 + 33.0 * s, y: -5.0 - 31.7 * s },
    );
    let window = Window::aligned(bounds);
    println!("Window {:?} has shape {:?}", window, window.shape());
    let read = source.read_flow_direction(&window)?;
    println!("{read}");

    tmp.close()?;
    Ok(())
}
