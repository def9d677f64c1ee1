use async_trait::async_trait;
use tracing::debug;

use super::{
    AlignmentInput, AlignmentStrategy, StrategyMode, StrategyOutcome, aggregate_result,
    zonal_statistics_query,
};
use crate::engine::{
    Afl, ArrayEngine, ArraySchema, ArraySession, AttributeType, DimensionDescriptor,
    ZONE_ATTRIBUTE,
};
use crate::processing::{binary_format, write_to_file};
use crate::util::Result;

/// Strategy 2: loads the zone cells with their absolute coordinates as attributes of a flat
/// array and matches them with the target by an equi-join on the coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquiJoinLoad {
    array_name: String,
}

impl EquiJoinLoad {
    pub fn new(array_name: &str) -> Self {
        Self {
            array_name: array_name.to_string(),
        }
    }
}

#[async_trait]
impl<E: ArrayEngine> AlignmentStrategy<E> for EquiJoinLoad {
    fn mode(&self) -> StrategyMode {
        StrategyMode::EquiJoinLoad
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
        let [rows, cols] = input.target.dimension_names()?;
        let data_type = input.zones.data_type();

        let schema = ArraySchema::new(
            vec![
                (rows, AttributeType::Int64).into(),
                (cols, AttributeType::Int64).into(),
                (ZONE_ATTRIBUTE, AttributeType::from(data_type)).into(),
            ],
            vec![DimensionDescriptor::new("xy", 0, None, 0, None)],
        );
        session
            .declare_array(&self.array_name, schema, true)
            .await?;

        let file = session.staging_file(&self.array_name);
        write_to_file(input.zones, input.extent.upper_left(), &file).await?;
        let transfer_time = session
            .bulk_load(&self.array_name, &file, &binary_format(data_type))
            .await?;

        let query = zonal_statistics_query(
            input.target.as_operand().between(overlap).equi_join(
                Afl::array(self.array_name.as_str()),
                &[rows, cols],
                &[rows, cols],
            ),
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
    use crate::error::Error;
    use crate::mock::InMemoryArrayEngine;
    use crate::util::test::{engine_with_raster, quadrant_values, quadrant_zone_grid};
    use pretty_assertions::assert_eq;
    use zonalstats_datatypes::primitives::BoundingBox2D;
    use zonalstats_datatypes::raster::{GeoTransform, RasterDataType, RasterGeometry, ZoneExtent};

    #[tokio::test]
    async fn joins_on_absolute_coordinates() {
        let engine = engine_with_raster("GLC2000", 4, 4, &quadrant_values());
        let mut session = ArraySession::new(engine, None).unwrap();
        let target = session.describe("GLC2000").await.unwrap();
        let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, 1.0, 4.0, -1.0);
        let raster = RasterGeometry::new(geo_transform, 4, 4, RasterDataType::F64).unwrap();
        let zones = quadrant_zone_grid().unwrap();
        let extent = ZoneExtent::new(
            BoundingBox2D::from_envelope(0.0, 4.0, 0.0, 4.0).unwrap(),
            &geo_transform,
        )
        .unwrap();
        let input = AlignmentInput {
            raster: &raster,
            zones: &zones,
            target: &target,
            extent: &extent,
            value_attribute: None,
        };

        let outcome = EquiJoinLoad::new("zonal_polygon")
            .align(&mut session, &input)
            .await
            .unwrap();

        let engine = session.engine();
        assert_eq!(
            engine.schema("zonal_polygon").unwrap().to_string(),
            "<y:int64, x:int64, id:int16> [xy=0:*:0:*]"
        );
        assert_eq!(engine.cell_count("zonal_polygon"), Some(16));
        assert_eq!(
            engine.queries().last().unwrap(),
            "grouped_aggregate(equi_join(between(GLC2000, 0, 0, 3, 3), zonal_polygon, \
             'left_names=y,x', 'right_names=y,x'), \
             min(value), max(value), avg(value), count(value), id)"
        );
        assert_eq!(outcome.result.len(), 2);
    }

    #[tokio::test]
    async fn fails_on_fatal_collision() {
        let mut engine = engine_with_raster("GLC2000", 4, 4, &quadrant_values());
        engine.set_sticky_removals(true);
        let mut session = ArraySession::new(engine, None).unwrap();
        let target = session.describe("GLC2000").await.unwrap();
        let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, 1.0, 4.0, -1.0);
        let raster = RasterGeometry::new(geo_transform, 4, 4, RasterDataType::F64).unwrap();
        let zones = quadrant_zone_grid().unwrap();
        let extent = ZoneExtent::new(
            BoundingBox2D::from_envelope(0.0, 4.0, 0.0, 4.0).unwrap(),
            &geo_transform,
        )
        .unwrap();
        let input = AlignmentInput {
            raster: &raster,
            zones: &zones,
            target: &target,
            extent: &extent,
            value_attribute: None,
        };
        let strategy = EquiJoinLoad::new("zonal_polygon");

        strategy.align(&mut session, &input).await.unwrap();
        let error = strategy.align(&mut session, &input).await.unwrap_err();

        assert!(matches!(error, Error::ArraySchemaConflict { .. }));
        assert_eq!(session.engine().removals(), 1);
    }
}
