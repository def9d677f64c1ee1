use gdal::Dataset;
use snafu::ResultExt;
use std::path::Path;
use zonalstats_datatypes::raster::{GeoTransform, RasterDataType, RasterGeometry};

use crate::error;
use crate::util::Result;
use crate::util::gdal::gdal_open_raster_dataset;

/// Reads the geo transform, size and the data type of band 1 of the raster at `path`.
pub fn raster_geometry_from_path(path: &Path) -> Result<RasterGeometry> {
    let dataset = gdal_open_raster_dataset(path).context(error::RasterUnreadable { path })?;
    raster_geometry_from_dataset(&dataset).map_err(|e| match e {
        error::Error::Gdal { source } => error::Error::RasterUnreadable {
            path: path.to_owned(),
            source,
        },
        other => other,
    })
}

pub fn raster_geometry_from_dataset(dataset: &Dataset) -> Result<RasterGeometry> {
    let geo_transform = GeoTransform::from(dataset.geo_transform()?);
    let (width, height) = dataset.raster_size();
    let data_type = RasterDataType::try_from(dataset.rasterband(1)?.band_type())?;

    Ok(RasterGeometry::new(
        geo_transform,
        width,
        height,
        data_type,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::{quadrant_values, write_geotiff};

    #[test]
    fn reads_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raster.tif");
        write_geotiff(&path, [10., 0.5, 0., 20., 0., -0.5], 4, 4, quadrant_values()).unwrap();

        let geometry = raster_geometry_from_path(&path).unwrap();

        assert_eq!(
            geometry.geo_transform,
            GeoTransform::new_with_coordinate_x_y(10., 0.5, 20., -0.5)
        );
        assert_eq!(geometry.width, 4);
        assert_eq!(geometry.height, 4);
        assert_eq!(geometry.data_type, RasterDataType::F64);
    }

    #[test]
    fn missing_raster() {
        let result = raster_geometry_from_path(Path::new("/does/not/exist.tif"));
        assert!(matches!(
            result,
            Err(error::Error::RasterUnreadable { .. })
        ));
    }
}
