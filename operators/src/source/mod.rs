mod raster;
mod zone_layer;

pub use self::raster::{raster_geometry_from_dataset, raster_geometry_from_path};
pub use self::zone_layer::{Zone, ZoneLayer};
