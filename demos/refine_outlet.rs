use anyhow::Result;
use geo::{Area, MultiPolygon, polygon};
use ndarray::Array2;
use upstream_refine::{CELL_SIZE, DelineationConfig, GeoTransform, InMemorySource, Thresholds, trace_upstream_catchment};

fn main() -> Result<()> {
    // two creeks meeting in the middle of a 7x7 catchment and leaving to the south
    let mut fdir: Array2<f64> = Array2::zeros((7, 7));
    for c in 0..3 {
        fdir[[3, c]] = 1.0;
    }
    for c in 4..7 {
        fdir[[3, c]] = 16.0;
    }
    for r in 3..7 {
        fdir[[r, 3]] = 4.0;
    }
    let mut acc: Array2<f64> = Array2::zeros((7, 7));
    for c in 0..3 {
        acc[[3, c]] = 100.0 * (c + 1) as f64;
        acc[[3, 6 - c]] = 100.0 * (c + 1) as f64;
    }
    for r in 3..7 {
        acc[[r, 3]] = 700.0 + r as f64;
    }
    println!("flow directions\n{fdir}");

    let s = CELL_SIZE;
    let transform = GeoTransform::new(172.5, -43.5, s, s);
    let fdir = InMemorySource::new(fdir, transform)?;
    let acc = InMemorySource::new(acc, transform)?;
    let catchment = MultiPolygon::new(vec![polygon![
        (x: 172.5, y: -43.5),
        (x: 172.5, y: -43.5 - 7.0 * s),
        (x: 172.5 + 7.0 * s, y: -43.5 - 7.0 * s),
        (x: 172.5 + 7.0 * s, y: -43.5),
    ]]);

    let config = DelineationConfig { thresholds: Thresholds { single: 250, multiple: 650 }, ..Default::default() };
    for single in [true, false] {
        // just west of the confluence
        let (lat, lng) = (-43.5 - 3.3 * s, 172.5 + 2.2 * s);
        let refined = trace_upstream_catchment(lat, lng, &catchment, single, &fdir, &acc, &config)?;
        println!(
            "single={single}: outlet ({:.6}, {:.6}), {} cells, area {:.3e} sq deg",
            refined.lat,
            refined.lng,
            refined.cells,
            refined.polygon.unsigned_area()
        );
    }

    Ok(())
}
