use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

///
/// A pixel position in a two dimensional grid, stored as `[row, col]` ~ `[y, x]`.
///
/// Indices are signed since zone grids may be placed left of or above the origin of a target array.
///
#[derive(
    Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy, Serialize, Deserialize,
)]
pub struct GridIdx2D(pub [i64; 2]);

impl GridIdx2D {
    pub fn new(row: i64, col: i64) -> Self {
        Self([row, col])
    }

    pub fn inner(&self) -> [i64; 2] {
        self.0
    }

    pub fn row(&self) -> i64 {
        self.0[0]
    }

    pub fn col(&self) -> i64 {
        self.0[1]
    }

    #[must_use]
    pub fn min_elements(&self, other: Self) -> Self {
        Self([self.row().min(other.row()), self.col().min(other.col())])
    }

    #[must_use]
    pub fn max_elements(&self, other: Self) -> Self {
        Self([self.row().max(other.row()), self.col().max(other.col())])
    }
}

impl From<[i64; 2]> for GridIdx2D {
    fn from(array: [i64; 2]) -> Self {
        GridIdx2D(array)
    }
}

impl From<i64> for GridIdx2D {
    fn from(scalar: i64) -> Self {
        GridIdx2D([scalar, scalar])
    }
}

impl From<GridIdx2D> for [i64; 2] {
    fn from(idx: GridIdx2D) -> Self {
        idx.0
    }
}

impl Add for GridIdx2D {
    type Output = GridIdx2D;

    fn add(self, rhs: Self) -> Self::Output {
        GridIdx2D([self.row() + rhs.row(), self.col() + rhs.col()])
    }
}

impl Sub for GridIdx2D {
    type Output = GridIdx2D;

    fn sub(self, rhs: Self) -> Self::Output {
        GridIdx2D([self.row() - rhs.row(), self.col() - rhs.col()])
    }
}

impl fmt::Display for GridIdx2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row(), self.col())
    }
}
