use gdal::raster::{RasterizeOptions, rasterize};
use gdal::{Dataset, DriverManager};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zonalstats_datatypes::raster::{
    GdalGeoTransform, GridShape2D, RasterGeometry, ZoneDataType, ZoneGrid,
};

use crate::source::ZoneLayer;
use crate::util::Result;

/// Burns zone polygons into a grid at the resolution of a raster.
///
/// The grid covers the extent of the zone layer, not the raster. Cells are decided by the
/// pixel center rule and cells outside of every polygon get the no-data value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRasterizer {
    pub id_field: String,
    pub no_data_value: i32,
    pub data_type: ZoneDataType,
}

impl Default for ZoneRasterizer {
    fn default() -> Self {
        Self {
            id_field: "ID".to_owned(),
            no_data_value: -999,
            data_type: ZoneDataType::Int16,
        }
    }
}

impl ZoneRasterizer {
    pub fn rasterize(&self, layer: &ZoneLayer, raster: &RasterGeometry) -> Result<ZoneGrid> {
        self.data_type
            .ensure_valid(i64::from(self.no_data_value))?;

        let extent = layer.extent()?;
        let pixel_size = raster.pixel_size();

        let width = grid_size(extent.size_x(), pixel_size);
        let height = grid_size(extent.size_y(), pixel_size);
        let shape = GridShape2D::new_2d(height, width);

        if shape.is_empty() {
            debug!(
                "Zone layer {} is smaller than one pixel of size {pixel_size}",
                layer.path().display()
            );
            return Ok(ZoneGrid::new_filled(
                shape,
                self.data_type,
                self.no_data_value,
            )?);
        }

        let zones = layer.zones(&self.id_field)?;
        for zone in &zones {
            self.data_type.ensure_valid(i64::from(zone.id))?;
        }

        let upper_left = extent.upper_left();
        let geo_transform: GdalGeoTransform = [
            upper_left.x,
            pixel_size,
            0.,
            upper_left.y,
            0.,
            raster.geo_transform.y_pixel_size,
        ];

        let mut dataset = self.create_mem_dataset(width, height)?;
        dataset.set_geo_transform(&geo_transform)?;
        {
            let mut band = dataset.rasterband(1)?;
            band.set_no_data_value(Some(f64::from(self.no_data_value)))?;
            band.fill(f64::from(self.no_data_value), None)?;
        }

        if !zones.is_empty() {
            let geometries: Vec<_> = zones.iter().map(|zone| zone.geometry.clone()).collect();
            let burn_values: Vec<f64> = zones.iter().map(|zone| f64::from(zone.id)).collect();

            rasterize(
                &mut dataset,
                &[1],
                &geometries,
                &burn_values,
                Some(RasterizeOptions::default()),
            )?;
        }

        let band = dataset.rasterband(1)?;
        let (_, data) = band
            .read_as::<i32>((0, 0), (width, height), (width, height), None)?
            .into_shape_and_vec();

        debug!(
            "Rasterized {} zones of {} into {height}×{width} cells",
            zones.len(),
            layer.path().display()
        );

        Ok(ZoneGrid::new(
            shape,
            data,
            self.data_type,
            self.no_data_value,
        )?)
    }

    fn create_mem_dataset(&self, width: usize, height: usize) -> Result<Dataset> {
        let driver = DriverManager::get_driver_by_name("MEM")?;
        let dataset = match self.data_type {
            ZoneDataType::Int16 => driver.create_with_band_type::<i16, _>("", width, height, 1)?,
            ZoneDataType::Int32 => driver.create_with_band_type::<i32, _>("", width, height, 1)?,
        };
        Ok(dataset)
    }
}

/// Number of whole pixels that fit into `length`.
fn grid_size(length: f64, pixel_size: f64) -> usize {
    let cells = (length / pixel_size).trunc();
    if cells.is_finite() && cells > 0. {
        cells as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::util::test::{RectangleZone, write_rectangle_zones};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use zonalstats_datatypes::raster::{GeoTransform, RasterDataType};

    fn raster(pixel_size: f64) -> RasterGeometry {
        RasterGeometry::new(
            GeoTransform::new_with_coordinate_x_y(0., pixel_size, 100., -pixel_size),
            1000,
            1000,
            RasterDataType::F32,
        )
        .unwrap()
    }

    fn layer(dir: &Path, zones: &[RectangleZone]) -> ZoneLayer {
        let path = dir.join("zones.geojson");
        write_rectangle_zones(&path, "ID", zones).unwrap();
        ZoneLayer::open(&path).unwrap()
    }

    #[test]
    fn square_burns_area_over_resolution_squared_cells() {
        let dir = tempfile::tempdir().unwrap();
        // area 36 at resolution 0.5 → 144 cells
        let layer = layer(
            dir.path(),
            &[RectangleZone {
                id: 7,
                min_x: 10.,
                max_x: 16.,
                min_y: 50.,
                max_y: 56.,
            }],
        );

        let grid = ZoneRasterizer::default()
            .rasterize(&layer, &raster(0.5))
            .unwrap();

        assert_eq!(grid.shape(), GridShape2D::new_2d(12, 12));
        assert_eq!(grid.zone_cell_count(7), 144);
        assert_eq!(grid.zone_cell_count(-999), 0);
        assert_eq!(grid.data_type(), ZoneDataType::Int16);
    }

    #[test]
    fn cells_outside_of_polygons_are_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let layer = layer(
            dir.path(),
            &[
                RectangleZone {
                    id: 1,
                    min_x: 0.,
                    max_x: 2.,
                    min_y: 2.,
                    max_y: 4.,
                },
                RectangleZone {
                    id: 2,
                    min_x: 2.,
                    max_x: 4.,
                    min_y: 0.,
                    max_y: 2.,
                },
            ],
        );

        let grid = ZoneRasterizer::default()
            .rasterize(&layer, &raster(1.))
            .unwrap();

        #[rustfmt::skip]
        let expected = vec![
            1, 1, -999, -999,
            1, 1, -999, -999,
            -999, -999, 2, 2,
            -999, -999, 2, 2,
        ];
        assert_eq!(grid.data(), expected.as_slice());
    }

    #[test]
    fn custom_id_field_and_data_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.geojson");
        write_rectangle_zones(
            &path,
            "ZONE",
            &[RectangleZone {
                id: 70_000,
                min_x: 0.,
                max_x: 3.,
                min_y: 0.,
                max_y: 2.,
            }],
        )
        .unwrap();
        let layer = ZoneLayer::open(&path).unwrap();

        let rasterizer = ZoneRasterizer {
            id_field: "ZONE".to_owned(),
            no_data_value: -1,
            data_type: ZoneDataType::Int32,
        };
        let grid = rasterizer.rasterize(&layer, &raster(1.)).unwrap();

        assert_eq!(grid.shape(), GridShape2D::new_2d(2, 3));
        assert_eq!(grid.zone_cell_count(70_000), 6);

        // does not fit into int16
        let result = ZoneRasterizer {
            id_field: "ZONE".to_owned(),
            ..ZoneRasterizer::default()
        }
        .rasterize(&layer, &raster(1.));
        assert!(matches!(result, Err(Error::DataType { .. })));
    }

    #[test]
    fn layer_smaller_than_a_pixel_gives_empty_grid() {
        let dir = tempfile::tempdir().unwrap();
        let layer = layer(
            dir.path(),
            &[RectangleZone {
                id: 1,
                min_x: 0.,
                max_x: 0.5,
                min_y: 0.,
                max_y: 0.5,
            }],
        );

        let grid = ZoneRasterizer::default()
            .rasterize(&layer, &raster(1.))
            .unwrap();

        assert!(grid.is_empty());
    }

    #[test]
    fn grid_size_truncates() {
        assert_eq!(grid_size(4.9, 1.), 4);
        assert_eq!(grid_size(4., 0.5), 8);
        assert_eq!(grid_size(4., -1.), 0);
    }
}
