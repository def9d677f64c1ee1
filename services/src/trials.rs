use serde::Serialize;
use snafu::ResultExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use zonalstats_datatypes::primitives::BoundingBox2D;
use zonalstats_datatypes::raster::{RasterGeometry, ZoneExtent, ZoneGrid};
use zonalstats_datatypes::zonal::AggregateResult;
use zonalstats_operators::engine::{ArrayEngine, ArraySession, RemoteArrayHandle};
use zonalstats_operators::processing::ZoneRasterizer;
use zonalstats_operators::source::{ZoneLayer, raster_geometry_from_path};
use zonalstats_operators::strategies::{
    AlignmentInput, AlignmentStrategy, StrategyMode, TemporaryArrayNames, strategy_for,
};

use crate::error::{self, Error, Result};

/// What a run measures and with which strategy.
#[derive(Debug, Clone)]
pub struct TrialSettings {
    pub zone_file: PathBuf,
    pub raster_file: PathBuf,
    /// The raster array inside the engine.
    pub array: String,
    pub mode: StrategyMode,
    pub trials: usize,
    pub rasterizer: ZoneRasterizer,
    pub array_names: TemporaryArrayNames,
    pub value_attribute: Option<String>,
}

/// One line of the timing report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    pub test: String,
    pub array_name: String,
    pub zone_file_path: String,
    pub transfer_time: f64,
    pub rasterization_time: f64,
    pub query_time: f64,
    pub total_time: f64,
    pub status: String,
    #[serde(skip)]
    pub result: AggregateResult,
}

impl TrialRecord {
    pub const HEADER: [&'static str; 8] = [
        "test",
        "array_name",
        "zone_file_path",
        "transfer_time",
        "rasterization_time",
        "query_time",
        "total_time",
        "status",
    ];

    fn trial_name(index: usize) -> String {
        format!("test_{}", index + 1)
    }

    fn succeeded(
        index: usize,
        settings: &TrialSettings,
        timings: TrialTimings,
        result: AggregateResult,
    ) -> Self {
        Self {
            test: Self::trial_name(index),
            array_name: settings.array.clone(),
            zone_file_path: settings.zone_file.display().to_string(),
            transfer_time: timings.transfer.as_secs_f64(),
            rasterization_time: timings.rasterization.as_secs_f64(),
            query_time: timings.query.as_secs_f64(),
            total_time: timings.total().as_secs_f64(),
            status: "ok".to_string(),
            result,
        }
    }

    fn failed(index: usize, settings: &TrialSettings, error: &Error) -> Self {
        Self {
            test: Self::trial_name(index),
            array_name: settings.array.clone(),
            zone_file_path: settings.zone_file.display().to_string(),
            transfer_time: 0.,
            rasterization_time: 0.,
            query_time: 0.,
            total_time: 0.,
            status: format!("failed: {error}"),
            result: AggregateResult::default(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TrialTimings {
    transfer: Duration,
    rasterization: Duration,
    query: Duration,
}

impl TrialTimings {
    fn total(&self) -> Duration {
        self.transfer + self.rasterization + self.query
    }
}

/// The zones of one trial, burned at the raster's resolution.
struct RasterizedZones {
    raster: RasterGeometry,
    zones: ZoneGrid,
    world: BoundingBox2D,
    rasterization_time: Duration,
}

/// Repeats the zonal statistics computation on one engine session and times its phases.
pub struct TrialRunner<E> {
    session: ArraySession<E>,
    settings: TrialSettings,
}

impl<E: ArrayEngine + 'static> TrialRunner<E> {
    pub fn new(session: ArraySession<E>, settings: TrialSettings) -> Self {
        Self { session, settings }
    }

    pub fn session(&self) -> &ArraySession<E> {
        &self.session
    }

    /// Runs all trials and releases the session afterwards, whether the trials ran or not.
    pub async fn run(mut self) -> Result<Vec<TrialRecord>> {
        let records = self.run_trials().await;

        if let Err(e) = self.session.release().await {
            warn!("Could not release the engine session: {e}");
        }

        let records = records?;
        info!("Finished");
        Ok(records)
    }

    /// Runs the trials one after another. A failing trial is recorded and does not stop
    /// the later ones, an unknown target array fails the whole run.
    pub async fn run_trials(&mut self) -> Result<Vec<TrialRecord>> {
        let target = self.session.describe(&self.settings.array).await?;
        let strategy: Box<dyn AlignmentStrategy<E>> =
            strategy_for(self.settings.mode, &self.settings.array_names);

        info!(
            "Running {} trials of mode {} on {}",
            self.settings.trials,
            self.settings.mode,
            target.name()
        );

        let mut records = Vec::with_capacity(self.settings.trials);
        for index in 0..self.settings.trials {
            let record = match self.run_trial(strategy.as_ref(), &target).await {
                Ok((timings, result)) => {
                    info!(
                        "{}: transfer {:?}, rasterization {:?}, query {:?}, total {:?}",
                        TrialRecord::trial_name(index),
                        timings.transfer,
                        timings.rasterization,
                        timings.query,
                        timings.total()
                    );
                    TrialRecord::succeeded(index, &self.settings, timings, result)
                }
                Err(e) => {
                    if e.is_geometry_error() {
                        error!(
                            "{} failed to rasterize {}: {e}",
                            TrialRecord::trial_name(index),
                            self.settings.zone_file.display()
                        );
                    } else {
                        error!("{} failed: {e}", TrialRecord::trial_name(index));
                    }
                    if let Some(text) = e.implicated_text() {
                        error!("{text}");
                    }
                    TrialRecord::failed(index, &self.settings, &e)
                }
            };
            records.push(record);

            if let Err(e) = self.session.reap().await {
                warn!(
                    "Could not remove the temporary arrays of {}: {e}",
                    TrialRecord::trial_name(index)
                );
            }
        }

        Ok(records)
    }

    async fn run_trial(
        &mut self,
        strategy: &dyn AlignmentStrategy<E>,
        target: &RemoteArrayHandle,
    ) -> Result<(TrialTimings, AggregateResult)> {
        let rasterized = rasterize_zones(
            self.settings.zone_file.clone(),
            self.settings.raster_file.clone(),
            self.settings.rasterizer.clone(),
        )
        .await?;

        let extent = ZoneExtent::new(rasterized.world, &rasterized.raster.geo_transform)?;
        debug!(
            "Zone extent {} covers the pixels {}",
            rasterized.world,
            extent.pixels()
        );

        let input = AlignmentInput {
            raster: &rasterized.raster,
            zones: &rasterized.zones,
            target,
            extent: &extent,
            value_attribute: self.settings.value_attribute.as_deref(),
        };

        let outcome = strategy.align(&mut self.session, &input).await?;

        Ok((
            TrialTimings {
                transfer: outcome.transfer_time,
                rasterization: rasterized.rasterization_time,
                query: outcome.query_time,
            },
            outcome.result,
        ))
    }
}

/// Reads the zone layer and the raster and burns the zones. Only the burning is timed.
async fn rasterize_zones(
    zone_file: PathBuf,
    raster_file: PathBuf,
    rasterizer: ZoneRasterizer,
) -> Result<RasterizedZones> {
    let rasterized = tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let layer = ZoneLayer::open(&zone_file)?;
        let world = layer.extent()?;
        let raster = raster_geometry_from_path(&raster_file)?;
        let zones = rasterizer.rasterize(&layer, &raster)?;
        let rasterization_time = start.elapsed();

        Ok::<_, zonalstats_operators::error::Error>(RasterizedZones {
            raster,
            zones,
            world,
            rasterization_time,
        })
    })
    .await??;

    Ok(rasterized)
}

/// Writes the records as CSV, always starting with the header line.
pub fn write_report(path: &Path, records: &[TrialRecord]) -> Result<()> {
    let file = File::create(path).context(error::ReportFile { path })?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer.write_record(TrialRecord::HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }

    writer.flush().context(error::ReportFile { path })
}
