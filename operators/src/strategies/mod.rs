//! The three ways of aligning a zone grid with a raster array inside the engine and computing
//! zonal statistics there.

mod direct_join;
mod equi_join;
mod global_join;

pub use direct_join::DirectTransferJoin;
pub use equi_join::EquiJoinLoad;
pub use global_join::GlobalRedimensionJoin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;
use std::time::Duration;
use zonalstats_datatypes::raster::{GridBoundingBox2D, RasterGeometry, ZoneExtent, ZoneGrid};
use zonalstats_datatypes::zonal::{AggregateResult, ZoneStatistics};

use crate::engine::{
    Afl, Aggregate, AggregateFunction, ArrayEngine, ArraySession, QueryResult, RemoteArrayHandle,
    ZONE_ATTRIBUTE,
};
use crate::error::{self, Error};
use crate::util::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StrategyMode {
    DirectTransferJoin = 1,
    EquiJoinLoad = 2,
    GlobalRedimensionJoin = 3,
}

impl TryFrom<u8> for StrategyMode {
    type Error = Error;

    fn try_from(mode: u8) -> Result<Self> {
        match mode {
            1 => Ok(StrategyMode::DirectTransferJoin),
            2 => Ok(StrategyMode::EquiJoinLoad),
            3 => Ok(StrategyMode::GlobalRedimensionJoin),
            _ => Err(Error::UnknownStrategyMode { mode }),
        }
    }
}

impl From<StrategyMode> for u8 {
    fn from(mode: StrategyMode) -> Self {
        mode as u8
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyMode::DirectTransferJoin => "direct transfer join",
            StrategyMode::EquiJoinLoad => "equi-join load",
            StrategyMode::GlobalRedimensionJoin => "global redimension-insert join",
        };
        write!(f, "{} ({name})", *self as u8)
    }
}

/// Everything a strategy aligns.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentInput<'a> {
    pub raster: &'a RasterGeometry,
    pub zones: &'a ZoneGrid,
    pub target: &'a RemoteArrayHandle,
    pub extent: &'a ZoneExtent,
    /// The raster attribute to aggregate, the target's first attribute if `None`.
    pub value_attribute: Option<&'a str>,
}

impl AlignmentInput<'_> {
    /// The pixels covered by the extent, the zone grid and the target array alike.
    pub fn overlap(&self) -> Result<Option<GridBoundingBox2D>> {
        let target_bounds = self.target.bounds()?;
        let Some(placement) =
            GridBoundingBox2D::from_origin_and_shape(self.extent.upper_left(), self.zones.shape())
        else {
            return Ok(None);
        };

        Ok(self
            .extent
            .pixels()
            .intersection(&placement)
            .and_then(|b| b.intersection(&target_bounds)))
    }

    pub fn value_attribute(&self) -> Result<&str> {
        self.target
            .value_attribute(self.value_attribute)
            .map(|attribute| attribute.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutcome {
    pub result: AggregateResult,
    pub transfer_time: Duration,
    pub query_time: Duration,
}

impl StrategyOutcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait AlignmentStrategy<E: ArrayEngine>: Send + Sync {
    fn mode(&self) -> StrategyMode;

    /// Moves the zones into the engine, aligns them with the target and aggregates the target's
    /// values per zone. The no-data zone is not part of the result.
    async fn align(
        &self,
        session: &mut ArraySession<E>,
        input: &AlignmentInput<'_>,
    ) -> Result<StrategyOutcome>;
}

/// Temporary array names of the strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryArrayNames {
    pub direct_join: String,
    pub equi_join: String,
    pub mask: String,
    pub staging: String,
}

impl Default for TemporaryArrayNames {
    fn default() -> Self {
        Self {
            direct_join: "zonal_states".to_string(),
            equi_join: "zonal_polygon".to_string(),
            mask: "zonal_mask".to_string(),
            staging: "zonal_zones".to_string(),
        }
    }
}

pub fn strategy_for<E: ArrayEngine + 'static>(
    mode: StrategyMode,
    names: &TemporaryArrayNames,
) -> Box<dyn AlignmentStrategy<E>> {
    match mode {
        StrategyMode::DirectTransferJoin => Box::new(DirectTransferJoin::new(&names.direct_join)),
        StrategyMode::EquiJoinLoad => Box::new(EquiJoinLoad::new(&names.equi_join)),
        StrategyMode::GlobalRedimensionJoin => {
            Box::new(GlobalRedimensionJoin::new(&names.mask, &names.staging))
        }
    }
}

/// `min`, `max`, `avg` and `count` of `value_attribute` per zone.
pub(crate) fn zonal_statistics_query(joined: Afl, value_attribute: &str) -> Afl {
    joined.grouped_aggregate(Aggregate::statistics_of(value_attribute), &[ZONE_ATTRIBUTE])
}

/// Reads the output of [`zonal_statistics_query`], leaving out the `no_data_value` zone.
pub(crate) fn aggregate_result(
    query: &Afl,
    output: &QueryResult,
    value_attribute: &str,
    no_data_value: i32,
) -> Result<AggregateResult> {
    let column = |name: String| -> Result<usize> {
        let index = output.column_index(&name);
        ensure!(
            index.is_some() || output.is_empty(),
            error::QueryResultParse {
                query: query.to_string(),
                column: name,
                reason: "missing column",
            }
        );
        Ok(index.unwrap_or_default())
    };
    let output_name = |function| Aggregate::new(function, value_attribute).output_name();

    let zone = column(ZONE_ATTRIBUTE.to_string())?;
    let min = column(output_name(AggregateFunction::Min))?;
    let max = column(output_name(AggregateFunction::Max))?;
    let mean = column(output_name(AggregateFunction::Avg))?;
    let count = column(output_name(AggregateFunction::Count))?;

    let mut result = AggregateResult::new();
    for row in &output.rows {
        if row[zone].is_nan() {
            continue;
        }
        result.insert(
            row[zone] as i64,
            ZoneStatistics {
                min: row[min],
                max: row[max],
                mean: row[mean],
                count: row[count] as u64,
            },
        );
    }

    Ok(result.without_zone(i64::from(no_data_value)))
}
