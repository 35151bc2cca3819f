//! Running many outlets at once.
//!
//! Outlets share nothing but the read-only grids, so they are spread over the rayon thread pool.
//! A failed outlet is logged and recorded as unresolved; it never stops the rest of the batch.

use std::collections::BTreeMap;

use geo::{MultiPolygon, Polygon};
use rayon::prelude::*;

use crate::config::DelineationConfig;
use crate::delineate::trace_upstream_catchment;
use crate::error::DelineationError;
use crate::raster::{GeoTiffSource, RasterSource};

/// One outlet handed over by the vector network stage.
#[derive(Debug, Clone)]
pub struct OutletRequest {
    pub id: String,
    /// Pfafstetter level 2 megabasin the outlet lies in, selects the grid files.
    pub basin: u32,
    pub lat: f64,
    pub lng: f64,
    /// Polygon of the most downstream unit catchment.
    pub catchment: MultiPolygon<f64>,
    pub is_single_catchment: bool,
}

/// What came out for one outlet.
#[derive(Debug, Clone)]
pub struct OutletRecord {
    pub id: String,
    pub polygon: Option<Polygon<f64>>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub error: Option<DelineationError>,
}

impl OutletRecord {
    fn failed(id: &str, error: DelineationError) -> Self {
        let (lat, lng) = error.snapped_outlet().unzip();
        OutletRecord { id: id.to_string(), polygon: None, lat, lng, error: Some(error) }
    }

    pub fn is_resolved(&self) -> bool {
        self.polygon.is_some()
    }
}

fn run_one(
    request: &OutletRequest,
    flow_direction: &dyn RasterSource,
    accumulation: &dyn RasterSource,
    config: &DelineationConfig,
) -> OutletRecord {
    let result = trace_upstream_catchment(
        request.lat,
        request.lng,
        &request.catchment,
        request.is_single_catchment,
        flow_direction,
        accumulation,
        config,
    );
    match result {
        Ok(refined) => {
            log::info!(
                "outlet {}: {} cells upstream of ({:.6}, {:.6})",
                request.id, refined.cells, refined.lat, refined.lng
            );
            OutletRecord {
                id: request.id.clone(),
                polygon: Some(refined.polygon),
                lat: Some(refined.lat),
                lng: Some(refined.lng),
                error: None,
            }
        }
        Err(e) => {
            log::warn!("outlet {} left unresolved: {e}", request.id);
            OutletRecord::failed(&request.id, e)
        }
    }
}

/// Refines every request against one pair of grids, in parallel.
///
/// Records come back in the order of `requests`.
pub fn delineate_batch(
    requests: &[OutletRequest],
    flow_direction: &dyn RasterSource,
    accumulation: &dyn RasterSource,
    config: &DelineationConfig,
) -> Vec<OutletRecord> {
    requests
        .par_iter()
        .map(|request| run_one(request, flow_direction, accumulation, config))
        .collect()
}

/// Refines requests from several megabasins, opening each basin's GeoTIFFs once.
///
/// Paths come from `config.datasets`. When a basin's grids cannot be opened, all of its outlets
/// are recorded with that error.
pub fn delineate_basins(requests: &[OutletRequest], config: &DelineationConfig) -> Vec<OutletRecord> {
    let mut by_basin: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, request) in requests.iter().enumerate() {
        by_basin.entry(request.basin).or_default().push(i);
    }

    let mut records: Vec<Option<OutletRecord>> = vec![None; requests.len()];
    for (basin, indices) in by_basin {
        let (fdir_path, acc_path) = config.datasets.resolve(basin);
        log::info!("basin {basin}: {} outlets, grids {:?} and {:?}", indices.len(), fdir_path, acc_path);

        let sources = GeoTiffSource::open(&fdir_path).and_then(|f| Ok((f, GeoTiffSource::open(&acc_path)?)));
        let basin_requests: Vec<OutletRequest> = indices.iter().map(|&i| requests[i].clone()).collect();
        let basin_records = match sources {
            Ok((fdir, acc)) => delineate_batch(&basin_requests, &fdir, &acc, config),
            Err(e) => {
                log::warn!("basin {basin} skipped: {e}");
                basin_requests.iter().map(|r| OutletRecord::failed(&r.id, e.clone())).collect()
            }
        };
        for (i, record) in indices.into_iter().zip(basin_records) {
            records[i] = Some(record);
        }
    }
    records.into_iter().flatten().collect()
}
