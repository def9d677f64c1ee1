use snafu::Snafu;

use crate::{
    primitives::Coordinate2D,
    raster::{GridBoundingBox2D, GridIdx2D, ZoneDataType},
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))] // disables default `Snafu` suffix
pub enum Error {
    #[snafu(display("The extent {} - {} is inverted", min, max))]
    InvalidBoundingBox { min: Coordinate2D, max: Coordinate2D },

    #[snafu(display(
        "The conditions min.y <= max.y && min.x <= max.x are not met by min:{} max:{}",
        min,
        max
    ))]
    InvalidGridBounds { min: GridIdx2D, max: GridIdx2D },

    #[snafu(display(
        "The zone extent maps to an inverted pixel box (ul:{} lr:{}); check the raster's geo transform",
        upper_left,
        lower_right
    ))]
    InvalidZoneExtent {
        upper_left: GridIdx2D,
        lower_right: GridIdx2D,
    },

    #[snafu(display("{} is not a valid index in the bounds {}", index, bounds))]
    GridIndexOutOfBounds {
        index: GridIdx2D,
        bounds: GridBoundingBox2D,
    },

    #[snafu(display(
        "Dimension capacity  ≠ data capacity ({} ≠ {})",
        dimension_cap,
        data_cap
    ))]
    DimensionCapacityDoesNotMatchDataCapacity {
        dimension_cap: usize,
        data_cap: usize,
    },

    #[snafu(display("Value {} cannot be represented as {}", value, data_type))]
    ValueOutOfDataTypeRange { value: i64, data_type: ZoneDataType },

    #[snafu(display("Pixel size must be non-zero and finite, found {}", pixel_size))]
    InvalidPixelSize { pixel_size: f64 },

    #[snafu(display("Unsupported zone data type `{}`, expected int16 or int32", name))]
    UnsupportedZoneDataType { name: String },

    #[snafu(display("GDAL data type {} is not supported for rasters", gdal_type))]
    UnsupportedGdalDataType { gdal_type: String },
}
