use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::util::ranges::{overlap_inclusive, value_in_range};
use crate::{error, util::Result};

use super::{GridIdx2D, GridShape2D};

/// An inclusive rectangle of grid indices, i.e. both `min` and `max` are part of the box.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct GridBoundingBox2D {
    min: GridIdx2D,
    max: GridIdx2D,
}

impl GridBoundingBox2D {
    pub fn new<I: Into<GridIdx2D>>(min: I, max: I) -> Result<Self> {
        let min = min.into();
        let max = max.into();
        ensure!(
            min.row() <= max.row() && min.col() <= max.col(),
            error::InvalidGridBounds { min, max }
        );
        Ok(Self::new_unchecked(min, max))
    }

    pub fn new_unchecked<I: Into<GridIdx2D>>(min: I, max: I) -> Self {
        GridBoundingBox2D {
            min: min.into(),
            max: max.into(),
        }
    }

    /// The bounding box of a grid with the given shape that starts at `origin`.
    /// Returns `None` for empty shapes.
    pub fn from_origin_and_shape(origin: GridIdx2D, shape: GridShape2D) -> Option<Self> {
        if shape.is_empty() {
            return None;
        }
        let extent = GridIdx2D::new(
            shape.axis_size_y() as i64 - 1,
            shape.axis_size_x() as i64 - 1,
        );
        Some(Self::new_unchecked(origin, origin + extent))
    }

    pub fn min_index(&self) -> GridIdx2D {
        self.min
    }

    pub fn max_index(&self) -> GridIdx2D {
        self.max
    }

    pub fn shape(&self) -> GridShape2D {
        GridShape2D::new_2d(
            (self.max.row() - self.min.row() + 1) as usize,
            (self.max.col() - self.min.col() + 1) as usize,
        )
    }

    pub fn number_of_elements(&self) -> usize {
        self.shape().number_of_elements()
    }

    pub fn contains(&self, idx: GridIdx2D) -> bool {
        value_in_range(idx.row(), self.min.row(), self.max.row())
            && value_in_range(idx.col(), self.min.col(), self.max.col())
    }

    pub fn contains_box(&self, other: &Self) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let y_overlap = overlap_inclusive(
            (self.min.row(), self.max.row()),
            (other.min.row(), other.max.row()),
        );
        let x_overlap = overlap_inclusive(
            (self.min.col(), self.max.col()),
            (other.min.col(), other.max.col()),
        );

        if let (Some((y_min, y_max)), Some((x_min, x_max))) = (y_overlap, x_overlap) {
            return Some(GridBoundingBox2D::new_unchecked(
                [y_min, x_min],
                [y_max, x_max],
            ));
        }
        None
    }

    /// Moves the box by `offset` without changing its shape.
    #[must_use]
    pub fn translate(&self, offset: GridIdx2D) -> Self {
        Self::new_unchecked(self.min + offset, self.max + offset)
    }
}

impl fmt::Display for GridBoundingBox2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.min, self.max)
    }
}
