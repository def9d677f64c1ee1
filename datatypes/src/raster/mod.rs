pub use self::data_type::{RasterDataType, ZoneDataType};
pub use self::geo_transform::{GdalGeoTransform, GeoTransform};
pub use self::grid_bounds::GridBoundingBox2D;
pub use self::grid_dimension::GridShape2D;
pub use self::grid_index::GridIdx2D;
pub use self::raster_geometry::RasterGeometry;
pub use self::zone_extent::ZoneExtent;
pub use self::zone_grid::ZoneGrid;

mod data_type;
mod geo_transform;
mod grid_bounds;
mod grid_dimension;
mod grid_index;
mod raster_geometry;
mod zone_extent;
mod zone_grid;
