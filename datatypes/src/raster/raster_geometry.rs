use serde::{Deserialize, Serialize};

use crate::util::Result;

use super::{GeoTransform, GridBoundingBox2D, GridShape2D, RasterDataType};

/// Describes a source raster: its geo transform, size in pixels and cell type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterGeometry {
    pub geo_transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub data_type: RasterDataType,
}

impl RasterGeometry {
    pub fn new(
        geo_transform: GeoTransform,
        width: usize,
        height: usize,
        data_type: RasterDataType,
    ) -> Result<Self> {
        geo_transform.validate()?;
        Ok(Self {
            geo_transform,
            width,
            height,
            data_type,
        })
    }

    /// The horizontal pixel size, which is also the zone rasterization resolution.
    pub fn pixel_size(&self) -> f64 {
        self.geo_transform.x_pixel_size
    }

    pub fn shape(&self) -> GridShape2D {
        GridShape2D::new_2d(self.height, self.width)
    }

    /// All pixels of the raster, `None` if it has no pixels at all.
    pub fn pixel_bounds(&self) -> Option<GridBoundingBox2D> {
        GridBoundingBox2D::from_origin_and_shape([0, 0].into(), self.shape())
    }
}
