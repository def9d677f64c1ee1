use super::Coordinate2D;
use crate::error;
use crate::util::Result;
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;

/// The axis aligned world extent of a zone layer. May degenerate to a line or a point.
#[derive(Copy, Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct BoundingBox2D {
    min: Coordinate2D,
    max: Coordinate2D,
}

impl BoundingBox2D {
    /// Fails unless `min` is left of and below `max`.
    pub fn new(min: Coordinate2D, max: Coordinate2D) -> Result<Self> {
        ensure!(
            min.x <= max.x && min.y <= max.y,
            error::InvalidBoundingBox { min, max }
        );
        Ok(Self { min, max })
    }

    /// Creates a bounding box from an OGR style envelope, i.e. `(min_x, max_x, min_y, max_y)`
    ///
    /// # Examples
    ///
    /// ```
    /// use zonalstats_datatypes::primitives::{Coordinate2D, BoundingBox2D};
    ///
    /// let bbox = BoundingBox2D::from_envelope(0.0, 10.0, -5.0, 5.0).unwrap();
    /// assert_eq!(bbox.upper_left(), Coordinate2D::new(0.0, 5.0));
    /// assert_eq!(bbox.lower_right(), Coordinate2D::new(10.0, -5.0));
    /// ```
    ///
    pub fn from_envelope(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Result<Self> {
        Self::new((min_x, min_y).into(), (max_x, max_y).into())
    }

    /// The corner that maps to the first row and column of a north-up raster.
    pub fn upper_left(&self) -> Coordinate2D {
        (self.min.x, self.max.y).into()
    }

    pub fn lower_right(&self) -> Coordinate2D {
        (self.max.x, self.min.y).into()
    }

    pub fn size_x(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn size_y(&self) -> f64 {
        self.max.y - self.min.y
    }
}

impl fmt::Display for BoundingBox2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.min, self.max)
    }
}
