//! Run configuration, passed explicitly to every entry point.
//!
//! ```toml
//! max_discarded_part_cells = 25.0
//!
//! [thresholds]
//! single = 500
//! multiple = 5000
//!
//! [datasets]
//! flow_direction = "/data/merit/flowdir_{basin}.tif"
//! accumulation = "/data/merit/accum_{basin}.tif"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Overrides `datasets.flow_direction`.
pub const FLOW_DIR_ENV: &str = "FLOW_DIR_PATH";
/// Overrides `datasets.accumulation`.
pub const ACCUM_ENV: &str = "ACCUM_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Minimum accumulation, in upstream cells, for a cell to count as a stream when snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Used when the watershed is a single unit catchment, possibly a headwater creek.
    pub single: u32,
    /// Used for larger watersheds, where small tributaries would pull the outlet off the river.
    pub multiple: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds { single: 500, multiple: 5000 }
    }
}

impl Thresholds {
    pub fn for_catchment(&self, is_single_catchment: bool) -> u32 {
        if is_single_catchment { self.single } else { self.multiple }
    }
}

/// Locations of the two grids. A `{basin}` placeholder is replaced by the megabasin code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatasetPaths {
    pub flow_direction: String,
    pub accumulation: String,
}

impl Default for DatasetPaths {
    fn default() -> Self {
        DatasetPaths {
            flow_direction: "flowdir_{basin}.tif".to_string(),
            accumulation: "accum_{basin}.tif".to_string(),
        }
    }
}

impl DatasetPaths {
    /// `(flow_direction, accumulation)` paths for one megabasin.
    pub fn resolve(&self, basin: u32) -> (PathBuf, PathBuf) {
        let code = basin.to_string();
        (
            PathBuf::from(self.flow_direction.replace("{basin}", &code)),
            PathBuf::from(self.accumulation.replace("{basin}", &code)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct DelineationConfig {
    pub thresholds: Thresholds,
    /// Largest polygon part, in cells, that may be thrown away when a trace comes out in pieces.
    /// Unset keeps the largest part whatever the size of the rest.
    pub max_discarded_part_cells: Option<f64>,
    pub datasets: DatasetPaths,
}

impl DelineationConfig {
    /// Parses and validates a TOML document. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: DelineationConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&text)
    }

    /// Replaces the dataset paths with `FLOW_DIR_PATH` / `ACCUM_PATH` when those are set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(FLOW_DIR_ENV) {
            log::debug!("{FLOW_DIR_ENV} overrides flow direction path with {path}");
            self.datasets.flow_direction = path;
        }
        if let Ok(path) = std::env::var(ACCUM_ENV) {
            log::debug!("{ACCUM_ENV} overrides accumulation path with {path}");
            self.datasets.accumulation = path;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thresholds.multiple <= self.thresholds.single {
            return Err(ConfigError::Invalid(format!(
                "thresholds.multiple ({}) must be larger than thresholds.single ({})",
                self.thresholds.multiple, self.thresholds.single
            )));
        }
        if let Some(tolerance) = self.max_discarded_part_cells {
            if !(tolerance >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "max_discarded_part_cells must be a non-negative number, got {tolerance}"
                )));
            }
        }
        Ok(())
    }
}
