use async_trait::async_trait;
use tracing::debug;
use zonalstats_datatypes::raster::{GridBoundingBox2D, GridIdx2D};

use super::{
    AlignmentInput, AlignmentStrategy, StrategyMode, StrategyOutcome, aggregate_result,
    zonal_statistics_query,
};
use crate::engine::{
    Afl, ApplyBinding, ApplyExpression, ArrayEngine, ArraySchema, ArraySession, Attribute,
    AttributeType, DimensionDescriptor, RangePredicate, ZONE_ATTRIBUTE,
};
use crate::processing::{binary_format, write_to_file};
use crate::util::Result;

/// Strategy 3: writes the zones into a mask array that shares the dimensions of the target and
/// joins both arrays cell by cell.
///
/// The zone cells are first loaded into a flat staging array with their local coordinates and
/// then moved into the mask by `insert(redimension(apply(..)))`, shifting them to the extent's
/// upper left pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalRedimensionJoin {
    mask_name: String,
    staging_name: String,
}

impl GlobalRedimensionJoin {
    pub fn new(mask_name: &str, staging_name: &str) -> Self {
        Self {
            mask_name: mask_name.to_string(),
            staging_name: staging_name.to_string(),
        }
    }
}

fn local_name(dimension: &str) -> String {
    format!("{dimension}_local")
}

#[async_trait]
impl<E: ArrayEngine> AlignmentStrategy<E> for GlobalRedimensionJoin {
    fn mode(&self) -> StrategyMode {
        StrategyMode::GlobalRedimensionJoin
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

        // the mask must match the target's declaration exactly, so ask the engine for it
        let target = session.describe(input.target.name()).await?;
        let target_bounds = target.bounds()?;
        let [rows, cols] = target.dimension_names()?;
        let value_attribute = target
            .value_attribute(input.value_attribute)?
            .name
            .clone();
        let data_type = AttributeType::from(input.zones.data_type());

        let mask_schema = target
            .schema()
            .with_attributes(vec![Attribute::new(ZONE_ATTRIBUTE, data_type)]);
        session
            .declare_array(&self.mask_name, mask_schema, true)
            .await?;

        let staging_schema = ArraySchema::new(
            vec![
                (local_name(rows), AttributeType::Int64).into(),
                (local_name(cols), AttributeType::Int64).into(),
                (ZONE_ATTRIBUTE, data_type).into(),
            ],
            vec![DimensionDescriptor::new("xy", 0, None, 0, None)],
        );
        session
            .declare_array(&self.staging_name, staging_schema, true)
            .await?;

        let file = session.staging_file(&self.staging_name);
        write_to_file(input.zones, GridIdx2D::new(0, 0), &file).await?;
        let load_time = session
            .bulk_load(
                &self.staging_name,
                &file,
                &binary_format(input.zones.data_type()),
            )
            .await?;
        debug!("Loaded {} in {load_time:?}", self.staging_name);

        let upper_left = input.extent.upper_left();
        let mut shifted = Afl::array(self.staging_name.as_str()).apply(vec![
            ApplyBinding::new(
                rows,
                ApplyExpression::offset(local_name(rows), upper_left.row()),
            ),
            ApplyBinding::new(
                cols,
                ApplyExpression::offset(local_name(cols), upper_left.col()),
            ),
        ]);

        let placement = GridBoundingBox2D::from_origin_and_shape(upper_left, input.zones.shape());
        if placement.is_none_or(|grid| !target_bounds.contains_box(&grid)) {
            let min = target_bounds.min_index();
            let max = target_bounds.max_index();
            shifted = shifted.filter(vec![
                RangePredicate::new(rows, min.row(), max.row()),
                RangePredicate::new(cols, min.col(), max.col()),
            ]);
        }

        // only the move into the mask counts as the transfer
        let transfer_time = session
            .execute(
                &shifted
                    .redimension(self.mask_name.as_str())
                    .insert(self.mask_name.as_str()),
            )
            .await?;

        let query = zonal_statistics_query(
            target
                .as_operand()
                .between(overlap)
                .join(Afl::array(self.mask_name.as_str()).between(overlap)),
            &value_attribute,
        );
        let (output, query_time) = session.submit_query(&query).await?;

        Ok(StrategyOutcome {
            result: aggregate_result(
                &query,
                &output,
                &value_attribute,
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
    use crate::mock::InMemoryArrayEngine;
    use crate::util::test::{engine_with_raster, quadrant_values, quadrant_zone_grid};
    use pretty_assertions::assert_eq;
    use zonalstats_datatypes::primitives::BoundingBox2D;
    use zonalstats_datatypes::raster::{GeoTransform, RasterDataType, RasterGeometry, ZoneExtent};

    async fn align(
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
    ) -> (ArraySession<InMemoryArrayEngine>, StrategyOutcome) {
        let engine = engine_with_raster("GLC2000", 4, 4, &quadrant_values());
        let mut session = ArraySession::new(engine, None).unwrap();
        let target = session.describe("GLC2000").await.unwrap();
        let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, 1.0, 4.0, -1.0);
        let raster = RasterGeometry::new(geo_transform, 4, 4, RasterDataType::F64).unwrap();
        let zones = quadrant_zone_grid().unwrap();
        let extent = ZoneExtent::new(
            BoundingBox2D::from_envelope(min_x, max_x, min_y, max_y).unwrap(),
            &geo_transform,
        )
        .unwrap();

        let outcome = GlobalRedimensionJoin::new("zonal_mask", "zonal_zones")
            .align(
                &mut session,
                &AlignmentInput {
                    raster: &raster,
                    zones: &zones,
                    target: &target,
                    extent: &extent,
                    value_attribute: None,
                },
            )
            .await
            .unwrap();

        (session, outcome)
    }

    #[tokio::test]
    async fn builds_mask_with_target_dimensions() {
        let (session, outcome) = align(0.0, 4.0, 0.0, 4.0).await;
        let engine = session.engine();

        assert_eq!(
            engine.schema("zonal_mask").unwrap().to_string(),
            "<id:int16> [y=0:3:0:1000; x=0:3:0:1000]"
        );
        assert_eq!(
            engine.schema("zonal_zones").unwrap().to_string(),
            "<y_local:int64, x_local:int64, id:int16> [xy=0:*:0:*]"
        );
        assert_eq!(engine.cell("zonal_mask", &[3, 3]), Some(&[2.][..]));

        let queries = engine.queries();
        assert!(queries.contains(&"show(GLC2000)".to_string()));
        assert!(queries.contains(
            &"insert(redimension(apply(zonal_zones, y, y_local+0, x, x_local+0), zonal_mask), zonal_mask)"
                .to_string()
        ));
        assert_eq!(
            queries.last().unwrap(),
            "grouped_aggregate(join(between(GLC2000, 0, 0, 3, 3), between(zonal_mask, 0, 0, 3, 3)), \
             min(value), max(value), avg(value), count(value), id)"
        );
        assert_eq!(outcome.result.len(), 2);
    }

    #[tokio::test]
    #[allow(clippy::float_cmp)]
    async fn filters_zones_outside_of_the_target() {
        let (session, outcome) = align(2.0, 6.0, 0.0, 4.0).await;
        let engine = session.engine();

        assert!(engine.queries().contains(
            &"insert(redimension(filter(apply(zonal_zones, y, y_local+0, x, x_local+2), \
              y>=0 and y<=3 and x>=0 and x<=3), zonal_mask), zonal_mask)"
                .to_string()
        ));
        assert_eq!(engine.cell_count("zonal_mask"), Some(8));
        assert_eq!(outcome.result.zone_ids().collect::<Vec<_>>(), vec![1]);
        let zone_1 = outcome.result.get(1).unwrap();
        assert_eq!((zone_1.min, zone_1.max, zone_1.count), (2.0, 2.0, 4));
    }
}
