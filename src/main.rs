//! Command line driver: refines a GeoJSON collection of terminal catchments.
//!
//! Input features are described in [`upstream_refine::features`]. The refined polygons are
//! printed to stdout as a GeoJSON FeatureCollection; outlets that could not be refined keep
//! whatever coordinate survived and carry an `error` property.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use geojson::{FeatureCollection, GeoJson};

use upstream_refine::features::{to_feature, to_request};
use upstream_refine::{DelineationConfig, delineate_basins};

#[derive(Debug, Parser)]
#[command(version, about = "Refine terminal unit catchments against D8 flow grids")]
struct Args {
    /// GeoJSON FeatureCollection of terminal catchment polygons.
    catchments: PathBuf,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Flow direction GeoTIFF, may contain `{basin}`.
    #[arg(long)]
    flow_dir: Option<String>,

    /// Flow accumulation GeoTIFF, may contain `{basin}`.
    #[arg(long)]
    accum: Option<String>,

    /// Snap threshold for single catchment watersheds.
    #[arg(long)]
    threshold_single: Option<u32>,

    /// Snap threshold for multi catchment watersheds.
    #[arg(long)]
    threshold_multiple: Option<u32>,
}

fn load_config(args: &Args) -> Result<DelineationConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => DelineationConfig::from_path(path)?,
        None => DelineationConfig::default(),
    }
    .with_env_overrides();

    if let Some(path) = &args.flow_dir {
        config.datasets.flow_direction = path.clone();
    }
    if let Some(path) = &args.accum {
        config.datasets.accumulation = path.clone();
    }
    if let Some(t) = args.threshold_single {
        config.thresholds.single = t;
    }
    if let Some(t) = args.threshold_multiple {
        config.thresholds.multiple = t;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;

    let text = std::fs::read_to_string(&args.catchments)?;
    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(f) => FeatureCollection { bbox: None, features: vec![f], foreign_members: None },
        GeoJson::Geometry(_) => return Err("expected a Feature or FeatureCollection".into()),
    };
    let requests = collection
        .features
        .into_iter()
        .enumerate()
        .map(|(i, f)| to_request(i, f))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("refining {} outlets", requests.len());

    let records = delineate_basins(&requests, &config);
    let resolved = records.iter().filter(|r| r.is_resolved()).count();
    log::info!("{resolved} of {} outlets refined", records.len());

    let output = FeatureCollection {
        bbox: None,
        features: records.into_iter().map(to_feature).collect(),
        foreign_members: None,
    };
    println!("{}", GeoJson::FeatureCollection(output));
    Ok(())
}
