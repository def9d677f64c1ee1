use crate::error;
use crate::primitives::{BoundingBox2D, Coordinate2D};
use crate::util::Result;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::{GridBoundingBox2D, GridIdx2D};

/// This is a typedef for the `GDAL GeoTransform`. It represents an affine transformation matrix.
pub type GdalGeoTransform = [f64; 6];

/// The `GeoTransform` is a more user friendly representation of the `GDAL GeoTransform` affine transformation matrix.
///
/// The rotation terms are carried along so that a transform read from a raster can be written back unchanged,
/// but the pixel mapping ignores them.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_coordinate: Coordinate2D,
    pub x_pixel_size: f64,
    pub x_rotation: f64,
    pub y_rotation: f64,
    pub y_pixel_size: f64,
}

impl GeoTransform {
    /// Generates a new north-up `GeoTransform`
    ///
    /// # Examples
    ///
    /// ```
    /// use zonalstats_datatypes::raster::GeoTransform;
    ///
    /// let geo_transform = GeoTransform::new((0.0, 0.0).into(), 1.0, -1.0);
    /// ```
    ///
    pub fn new(origin_coordinate: Coordinate2D, x_pixel_size: f64, y_pixel_size: f64) -> Self {
        Self {
            origin_coordinate,
            x_pixel_size,
            x_rotation: 0.0,
            y_rotation: 0.0,
            y_pixel_size,
        }
    }

    /// Generates a new `GeoTransform` with explicit x, y values of the upper left edge
    ///
    /// # Examples
    ///
    /// ```
    /// use zonalstats_datatypes::raster::GeoTransform;
    ///
    /// let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, 1.0, 0.0, -1.0);
    /// ```
    ///
    pub fn new_with_coordinate_x_y(
        origin_coordinate_x: f64,
        x_pixel_size: f64,
        origin_coordinate_y: f64,
        y_pixel_size: f64,
    ) -> Self {
        Self::new(
            (origin_coordinate_x, origin_coordinate_y).into(),
            x_pixel_size,
            y_pixel_size,
        )
    }

    /// Checks that the horizontal pixel size can be used as a divisor.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.x_pixel_size.is_finite() && self.x_pixel_size != 0.0,
            error::InvalidPixelSize {
                pixel_size: self.x_pixel_size
            }
        );
        Ok(())
    }

    /// Transforms an SRS coordinate (x,y) into a grid index (row, column) ~ (y, x)
    ///
    /// `col = floor((x - origin_x) / x_pixel_size)` and `row = floor((origin_y - y) / x_pixel_size)`.
    ///
    /// NOTE: the row is computed with the *horizontal* pixel size, too. This is only correct for square pixels,
    /// but zone masks that were already loaded into an array engine were aligned this way, so it is kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use zonalstats_datatypes::raster::{GeoTransform, GridIdx2D};
    ///
    /// let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, 1.0, 0.0, -1.0);
    /// assert_eq!(geo_transform.world_to_pixel((2.5, -1.5).into()), GridIdx2D::new(1, 2))
    /// ```
    ///
    pub fn world_to_pixel(&self, coord: Coordinate2D) -> GridIdx2D {
        let col = ((coord.x - self.origin_coordinate.x) / self.x_pixel_size).floor() as i64;
        let row = ((self.origin_coordinate.y - coord.y) / self.x_pixel_size).floor() as i64;
        GridIdx2D::new(row, col)
    }

    /// Transforms a grid index (row, column) ~ (y, x) into the SRS coordinate (x,y) of its upper left corner.
    ///
    /// This is the inverse of [`GeoTransform::world_to_pixel`] for coordinates on the grid, including its use
    /// of the horizontal pixel size for rows.
    ///
    /// # Examples
    ///
    /// ```
    /// use zonalstats_datatypes::raster::{GeoTransform, GridIdx2D};
    /// use zonalstats_datatypes::primitives::Coordinate2D;
    ///
    /// let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, 1.0, 0.0, -1.0);
    /// assert_eq!(geo_transform.pixel_to_world(GridIdx2D::new(1, 2)), Coordinate2D::new(2.0, -1.0))
    /// ```
    ///
    pub fn pixel_to_world(&self, idx: GridIdx2D) -> Coordinate2D {
        let x = self.origin_coordinate.x + idx.col() as f64 * self.x_pixel_size;
        let y = self.origin_coordinate.y - idx.row() as f64 * self.x_pixel_size;
        Coordinate2D::new(x, y)
    }

    /// Maps the corners of a world bounding box to pixels, i.e. the upper left corner to `min` and the
    /// lower right corner to `max` of the returned box.
    ///
    /// Fails with `InvalidZoneExtent` if the mapped corners are not in order, which happens for transforms
    /// that are not north-up.
    pub fn pixel_bounds(&self, bounding_box: BoundingBox2D) -> Result<GridBoundingBox2D> {
        let upper_left = self.world_to_pixel(bounding_box.upper_left());
        let lower_right = self.world_to_pixel(bounding_box.lower_right());
        ensure!(
            upper_left.row() <= lower_right.row() && upper_left.col() <= lower_right.col(),
            error::InvalidZoneExtent {
                upper_left,
                lower_right
            }
        );
        Ok(GridBoundingBox2D::new_unchecked(upper_left, lower_right))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        GeoTransform::new_with_coordinate_x_y(0.0, 1.0, 0.0, -1.0)
    }
}

impl From<GdalGeoTransform> for GeoTransform {
    fn from(gdal_geo_transform: GdalGeoTransform) -> Self {
        Self {
            origin_coordinate: (gdal_geo_transform[0], gdal_geo_transform[3]).into(),
            x_pixel_size: gdal_geo_transform[1],
            x_rotation: gdal_geo_transform[2],
            y_rotation: gdal_geo_transform[4],
            y_pixel_size: gdal_geo_transform[5],
        }
    }
}

impl From<GeoTransform> for GdalGeoTransform {
    fn from(geo_transform: GeoTransform) -> GdalGeoTransform {
        [
            geo_transform.origin_coordinate.x,
            geo_transform.x_pixel_size,
            geo_transform.x_rotation,
            geo_transform.origin_coordinate.y,
            geo_transform.y_rotation,
            geo_transform.y_pixel_size,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn world_to_pixel_floors() {
        let geo_transform = GeoTransform::new_with_coordinate_x_y(10.0, 2.0, 20.0, -2.0);

        assert_eq!(
            geo_transform.world_to_pixel((10.0, 20.0).into()),
            GridIdx2D::new(0, 0)
        );
        assert_eq!(
            geo_transform.world_to_pixel((13.9, 16.1).into()),
            GridIdx2D::new(1, 1)
        );
        // left of and above the origin
        assert_eq!(
            geo_transform.world_to_pixel((9.0, 21.0).into()),
            GridIdx2D::new(-1, -1)
        );
    }

    #[test]
    fn world_to_pixel_uses_horizontal_pixel_size_for_rows() {
        // 2 units wide, 1 unit high
        let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, 2.0, 0.0, -1.0);

        assert_eq!(
            geo_transform.world_to_pixel((4.0, -4.0).into()),
            GridIdx2D::new(2, 2)
        );
    }

    #[test]
    fn pixel_round_trip() {
        let geo_transform = GeoTransform::new_with_coordinate_x_y(-180.0, 0.25, 90.0, -0.25);

        for (x, y) in [(-180.0, 90.0), (-179.75, 89.5), (12.0, -45.25), (179.75, -89.75)] {
            let idx = geo_transform.world_to_pixel((x, y).into());
            let back = geo_transform.pixel_to_world(idx);
            assert!(approx_eq!(f64, back.x, x, epsilon = 0.25));
            assert!(approx_eq!(f64, back.y, y, epsilon = 0.25));
        }
    }

    #[test]
    fn pixel_bounds_of_bbox() {
        let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, 1.0, 10.0, -1.0);
        let bbox = BoundingBox2D::from_envelope(2.0, 5.0, 3.0, 8.0).unwrap();

        assert_eq!(
            geo_transform.pixel_bounds(bbox).unwrap(),
            GridBoundingBox2D::new([2, 2], [7, 5]).unwrap()
        );
    }

    #[test]
    fn pixel_bounds_rejects_inverted_axes() {
        let geo_transform = GeoTransform::new_with_coordinate_x_y(0.0, -1.0, 10.0, 1.0);
        let bbox = BoundingBox2D::from_envelope(2.0, 5.0, 3.0, 8.0).unwrap();

        assert!(geo_transform.pixel_bounds(bbox).is_err());
    }

    #[test]
    fn validate_pixel_size() {
        assert!(GeoTransform::default().validate().is_ok());
        assert!(
            GeoTransform::new_with_coordinate_x_y(0.0, 0.0, 0.0, -1.0)
                .validate()
                .is_err()
        );
        assert!(
            GeoTransform::new_with_coordinate_x_y(0.0, f64::NAN, 0.0, -1.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn gdal_geo_transform_conversion() {
        let gdal: GdalGeoTransform = [1.0, 0.5, 0.1, 2.0, 0.2, -0.5];
        let geo_transform = GeoTransform::from(gdal);

        assert_eq!(geo_transform.origin_coordinate, Coordinate2D::new(1.0, 2.0));
        assert_eq!(GdalGeoTransform::from(geo_transform), gdal);
    }
}
