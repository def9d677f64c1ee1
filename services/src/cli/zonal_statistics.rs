use clap::Parser;
use snafu::ensure;
use std::path::{Path, PathBuf};
use tracing::info;
use zonalstats_operators::engine::{ArraySession, ShimArrayEngine};
use zonalstats_operators::strategies::{StrategyMode, TemporaryArrayNames};

use crate::config::{self, get_config_element};
use crate::error::{self, Result};
use crate::logging::init_logging;
use crate::trials::{TrialRecord, TrialRunner, TrialSettings, write_report};

/// Times zonal statistics of polygons over a raster array inside SciDB
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct ZonalStatistics {
    /// Polygon file with the zones
    #[arg(long)]
    pub zones: PathBuf,

    /// Raster file the array was loaded from, it provides the geo transform
    #[arg(long)]
    pub raster: PathBuf,

    /// Name of the raster array inside the engine
    #[arg(long)]
    pub array: String,

    /// 1 = direct transfer join, 2 = equi-join load, 3 = global redimension-insert join
    #[arg(long, default_value = "1", value_parser = parse_mode)]
    pub mode: StrategyMode,

    /// Number of trials
    #[arg(long, default_value_t = 3)]
    pub tests: usize,

    /// Writes the timings of all trials to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Logs every query
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_mode(mode: &str) -> Result<StrategyMode, String> {
    let mode: u8 = mode.parse().map_err(|e| format!("{e}"))?;
    StrategyMode::try_from(mode).map_err(|e| e.to_string())
}

/// Fails for the first input file that does not exist.
pub fn check_inputs(paths: &[&Path]) -> Result<()> {
    for path in paths {
        ensure!(path.exists(), error::InputNotFound { path: *path });
    }
    Ok(())
}

/// Runs the trials against the configured engine and writes the report.
pub async fn run_zonal_statistics(params: ZonalStatistics) -> Result<Vec<TrialRecord>> {
    check_inputs(&[&params.zones, &params.raster])?;

    let logging_config: config::Logging = get_config_element()?;
    init_logging(&logging_config, params.verbose)?;

    let engine_config: config::Engine = get_config_element()?;
    let arrays: config::Arrays = get_config_element()?;
    let rasterization: config::Rasterization = get_config_element()?;

    info!("Connecting to {}", engine_config.url);
    let engine = ShimArrayEngine::new(engine_config.url.clone(), engine_config.credentials());
    let session = ArraySession::new(engine, engine_config.load_directory.clone())?;

    let settings = TrialSettings {
        zone_file: params.zones,
        raster_file: params.raster,
        array: params.array,
        mode: params.mode,
        trials: params.tests,
        rasterizer: rasterization.into(),
        array_names: TemporaryArrayNames::from(&arrays),
        value_attribute: arrays.value_attribute,
    };

    let records = TrialRunner::new(session, settings).run().await?;

    if let Some(csv) = &params.csv {
        write_report(csv, &records)?;
        info!("Wrote the report to {}", csv.display());
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_parses_the_arguments() {
        let params = ZonalStatistics::try_parse_from([
            "zonalstats",
            "--zones",
            "states.shp",
            "--raster",
            "glc2000.tif",
            "--array",
            "GLC2000",
            "--mode",
            "3",
            "--csv",
            "timings.csv",
            "-v",
        ])
        .unwrap();

        assert_eq!(params.zones, PathBuf::from("states.shp"));
        assert_eq!(params.array, "GLC2000");
        assert_eq!(params.mode, StrategyMode::GlobalRedimensionJoin);
        assert_eq!(params.tests, 3);
        assert_eq!(params.csv, Some(PathBuf::from("timings.csv")));
        assert!(params.verbose);
    }

    #[test]
    fn mode_defaults_to_direct_transfer() {
        let params = ZonalStatistics::try_parse_from([
            "zonalstats",
            "--zones",
            "states.shp",
            "--raster",
            "glc2000.tif",
            "--array",
            "GLC2000",
            "--tests",
            "10",
        ])
        .unwrap();

        assert_eq!(params.mode, StrategyMode::DirectTransferJoin);
        assert_eq!(params.tests, 10);
        assert_eq!(params.csv, None);
        assert!(!params.verbose);
    }

    #[test]
    fn it_rejects_unknown_modes() {
        for mode in ["0", "4", "equi"] {
            assert!(
                ZonalStatistics::try_parse_from([
                    "zonalstats",
                    "--zones",
                    "states.shp",
                    "--raster",
                    "glc2000.tif",
                    "--array",
                    "GLC2000",
                    "--mode",
                    mode,
                ])
                .is_err()
            );
        }
    }

    #[test]
    fn it_names_the_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let zones = dir.path().join("states.shp");
        let raster = dir.path().join("glc2000.tif");
        std::fs::write(&zones, b"").unwrap();

        assert!(check_inputs(&[&zones]).is_ok());

        let error = check_inputs(&[&zones, &raster]).unwrap_err();
        assert!(matches!(&error, Error::InputNotFound { path } if *path == raster));
        assert_eq!(
            error.to_string(),
            format!("FilePath {} does not exist", raster.display())
        );
    }

    #[tokio::test]
    async fn missing_inputs_fail_before_contacting_the_engine() {
        let dir = tempfile::tempdir().unwrap();

        let result = run_zonal_statistics(ZonalStatistics {
            zones: dir.path().join("states.shp"),
            raster: dir.path().join("glc2000.tif"),
            array: "GLC2000".to_string(),
            mode: StrategyMode::DirectTransferJoin,
            tests: 1,
            csv: None,
            verbose: false,
        })
        .await;

        assert!(matches!(result, Err(Error::InputNotFound { .. })));
    }
}
