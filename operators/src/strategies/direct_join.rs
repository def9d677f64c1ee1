use async_trait::async_trait;
use tracing::debug;
use zonalstats_datatypes::raster::GridIdx2D;

use super::{
    AlignmentInput, AlignmentStrategy, StrategyMode, StrategyOutcome, aggregate_result,
    zonal_statistics_query,
};
use crate::engine::{ArrayEngine, ArraySession};
use crate::util::Result;

/// Strategy 1: stores the zone grid as a dense array and joins it positionally with a
/// `subarray` of the target, i.e. both sides are shifted to the origin of the overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectTransferJoin {
    array_name: String,
}

impl DirectTransferJoin {
    pub fn new(array_name: &str) -> Self {
        Self {
            array_name: array_name.to_string(),
        }
    }
}

#[async_trait]
impl<E: ArrayEngine> AlignmentStrategy<E> for DirectTransferJoin {
    fn mode(&self) -> StrategyMode {
        StrategyMode::DirectTransferJoin
    }

    async fn align(
        &self,
        session: &mut ArraySession<E>,
        input: &AlignmentInput<'_>,
    ) -> Result<StrategyOutcome> {
        let Some(overlap) = input.overlap()? else {
            debug!("Zones do not overlap {}", input.target.name());
            return Ok(StrategyOutcome::empty());
        };
        let value_attribute = input.value_attribute()?;
        let dimension_names = input.target.dimension_names()?;

        let shape = input.zones.shape();
        let chunk_length = shape.axis_size_y().max(shape.axis_size_x()) as i64;
        let (zones, transfer_time) = session
            .upload_grid(&self.array_name, input.zones, dimension_names, chunk_length)
            .await?;

        let upper_left = input.extent.upper_left();
        let local = overlap.translate(GridIdx2D::new(-upper_left.row(), -upper_left.col()));

        let query = zonal_statistics_query(
            zones
                .as_operand()
                .subarray(local)
                .join(input.target.as_operand().subarray(overlap)),
            value_attribute,
        );
        let (output, query_time) = session.submit_query(&query).await?;

        Ok(StrategyOutcome {
            result: aggregate_result(
                &query,
                &output,
                value_attribute,
                input.zones.no_data_value(),
            )?,
            transfer_time,
            query_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RemoteArrayHandle;
    use crate::mock::InMemoryArrayEngine;
    use crate::util::test::{engine_with_raster, quadrant_values, quadrant_zone_grid};
    use pretty_assertions::assert_eq;
    use zonalstats_datatypes::primitives::BoundingBox2D;
    use zonalstats_datatypes::raster::{GeoTransform, RasterDataType, RasterGeometry, ZoneExtent};

    #[tokio::test]
    #[allow(clippy::float_cmp)]
    async fn issues_positional_join() {
        let engine = engine_with_raster("GLC2000", 4, 4, &quadrant_values());
        let mut session = ArraySession::new(engine, None).unwrap();
        let target: RemoteArrayHandle = session.describe("GLC2000").await.unwrap();
        let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, 1.0, 4.0, -1.0);
        let raster = RasterGeometry::new(geo_transform, 4, 4, RasterDataType::F64).unwrap();
        let zones = quadrant_zone_grid().unwrap();
        let extent = ZoneExtent::new(
            BoundingBox2D::from_envelope(1.0, 5.0, 0.0, 4.0).unwrap(),
            &geo_transform,
        )
        .unwrap();

        let outcome = DirectTransferJoin::new("zonal_states")
            .align(
                &mut session,
                &AlignmentInput {
                    raster: &raster,
                    zones: &zones,
                    target: &target,
                    extent: &extent,
                    value_attribute: Some("value"),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            session.engine().queries().last().unwrap(),
            "grouped_aggregate(join(subarray(zonal_states, 0, 0, 3, 2), \
             subarray(GLC2000, 0, 1, 3, 3)), \
             min(value), max(value), avg(value), count(value), id)"
        );
        assert_eq!(outcome.result.zone_ids().collect::<Vec<_>>(), vec![1, 2]);
        let zone_1 = outcome.result.get(1).unwrap();
        assert_eq!((zone_1.min, zone_1.max, zone_1.count), (1.0, 2.0, 4));
        let zone_2 = outcome.result.get(2).unwrap();
        assert_eq!((zone_2.min, zone_2.max, zone_2.count), (4.0, 4.0, 2));
        assert!(session.temporaries().contains(&"zonal_states".to_string()));
    }
}
