#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use tempfile::NamedTempFile;
    use upstream_refine::config::{ACCUM_ENV, FLOW_DIR_ENV};
    use upstream_refine::{ConfigError, DatasetPaths, DelineationConfig, Thresholds};

    #[test]
    fn test_defaults() {
        let config = DelineationConfig::default();
        assert_eq!(config.thresholds, Thresholds { single: 500, multiple: 5000 });
        assert_eq!(config.max_discarded_part_cells, None);
        assert!(config.validate().is_ok());
        assert_eq!(DelineationConfig::from_toml("").unwrap(), config);
    }

    #[test]
    fn test_full_document() {
        let config = DelineationConfig::from_toml(
            r#"
            max_discarded_part_cells = 25.0

            [thresholds]
            single = 300
            multiple = 3000

            [datasets]
            flow_direction = "/data/flowdir_{basin}.tif"
            accumulation = "/data/accum_{basin}.tif"
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.for_catchment(true), 300);
        assert_eq!(config.thresholds.for_catchment(false), 3000);
        assert_eq!(config.max_discarded_part_cells, Some(25.0));

        let (fdir, acc) = config.datasets.resolve(42);
        assert_eq!(fdir.to_str(), Some("/data/flowdir_42.tif"));
        assert_eq!(acc.to_str(), Some("/data/accum_42.tif"));
    }

    #[test]
    fn test_partial_thresholds_keep_defaults() {
        let config = DelineationConfig::from_toml("[thresholds]\nmultiple = 8000\n").unwrap();
        assert_eq!(config.thresholds, Thresholds { single: 500, multiple: 8000 });
        assert_eq!(config.datasets, DatasetPaths::default());
    }

    #[test]
    fn test_invalid_values() {
        let inverted = DelineationConfig::from_toml("[thresholds]\nsingle = 5000\nmultiple = 500\n");
        assert!(matches!(inverted, Err(ConfigError::Invalid(_))));

        let equal = DelineationConfig::from_toml("[thresholds]\nsingle = 500\nmultiple = 500\n");
        assert!(matches!(equal, Err(ConfigError::Invalid(_))));

        let negative = DelineationConfig::from_toml("max_discarded_part_cells = -1.0\n");
        assert!(matches!(negative, Err(ConfigError::Invalid(_))));

        let malformed = DelineationConfig::from_toml("[thresholds]\nsingle = \"lots\"\n");
        assert!(matches!(malformed, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_path() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "[thresholds]\nsingle = 100\nmultiple = 1000")?;
        let config = DelineationConfig::from_path(file.path())?;
        assert_eq!(config.thresholds.single, 100);

        let missing = DelineationConfig::from_path("/nonexistent/refine.toml");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
        Ok(())
    }

    #[test]
    fn test_env_overrides_dataset_paths() {
        // SAFETY: no other test reads or writes these variables
        unsafe {
            std::env::set_var(FLOW_DIR_ENV, "/srv/fdir_{basin}.tif");
            std::env::remove_var(ACCUM_ENV);
        }
        let config = DelineationConfig::default().with_env_overrides();
        unsafe {
            std::env::remove_var(FLOW_DIR_ENV);
        }
        assert_eq!(config.datasets.flow_direction, "/srv/fdir_{basin}.tif");
        assert_eq!(config.datasets.accumulation, DatasetPaths::default().accumulation);
    }
}
