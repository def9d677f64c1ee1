use serde::{Deserialize, Serialize};

use crate::primitives::BoundingBox2D;
use crate::util::Result;

use super::{GeoTransform, GridBoundingBox2D, GridIdx2D};

/// The extent of a zone layer in world coordinates together with the pixel box it covers in a raster.
///
/// The pixel box is inclusive and always ordered, i.e. `upper_left <= lower_right` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneExtent {
    world: BoundingBox2D,
    pixels: GridBoundingBox2D,
}

impl ZoneExtent {
    pub fn new(world: BoundingBox2D, geo_transform: &GeoTransform) -> Result<Self> {
        let pixels = geo_transform.pixel_bounds(world)?;
        Ok(Self { world, pixels })
    }

    pub fn world(&self) -> BoundingBox2D {
        self.world
    }

    pub fn pixels(&self) -> GridBoundingBox2D {
        self.pixels
    }

    /// `(ulY, ulX)` of the extent
    pub fn upper_left(&self) -> GridIdx2D {
        self.pixels.min_index()
    }

    /// `(lrY, lrX)` of the extent
    pub fn lower_right(&self) -> GridIdx2D {
        self.pixels.max_index()
    }
}
