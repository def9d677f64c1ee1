use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::error;
use crate::util::Result;

use super::{GridIdx2D, GridShape2D, ZoneDataType};

/// A dense, row-major grid of zone identifiers with a no-data value for cells outside of every zone.
///
/// Values are kept as `i32` regardless of the `data_type`; construction guarantees they fit into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneGrid {
    shape: GridShape2D,
    data: Vec<i32>,
    data_type: ZoneDataType,
    no_data_value: i32,
}

impl ZoneGrid {
    pub fn new(
        shape: GridShape2D,
        data: Vec<i32>,
        data_type: ZoneDataType,
        no_data_value: i32,
    ) -> Result<Self> {
        ensure!(
            shape.number_of_elements() == data.len(),
            error::DimensionCapacityDoesNotMatchDataCapacity {
                dimension_cap: shape.number_of_elements(),
                data_cap: data.len()
            }
        );

        data_type.ensure_valid(i64::from(no_data_value))?;
        for value in &data {
            data_type.ensure_valid(i64::from(*value))?;
        }

        Ok(Self {
            shape,
            data,
            data_type,
            no_data_value,
        })
    }

    /// A grid where every cell is no-data.
    pub fn new_filled(
        shape: GridShape2D,
        data_type: ZoneDataType,
        no_data_value: i32,
    ) -> Result<Self> {
        Self::new(
            shape,
            vec![no_data_value; shape.number_of_elements()],
            data_type,
            no_data_value,
        )
    }

    pub fn shape(&self) -> GridShape2D {
        self.shape
    }

    pub fn data(&self) -> &[i32] {
        &self.data
    }

    pub fn data_type(&self) -> ZoneDataType {
        self.data_type
    }

    pub fn no_data_value(&self) -> i32 {
        self.no_data_value
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// The value at a local grid index, `None` if outside of the grid.
    pub fn get(&self, idx: GridIdx2D) -> Option<i32> {
        let row = usize::try_from(idx.row()).ok()?;
        let col = usize::try_from(idx.col()).ok()?;
        if row >= self.shape.axis_size_y() || col >= self.shape.axis_size_x() {
            return None;
        }
        self.data.get(row * self.shape.axis_size_x() + col).copied()
    }

    /// All cells in row-major order together with their local index.
    pub fn indexed_cells(&self) -> impl Iterator<Item = (GridIdx2D, i32)> + '_ {
        let width = self.shape.axis_size_x();
        self.data.iter().enumerate().map(move |(i, value)| {
            let row = (i / width) as i64;
            let col = (i % width) as i64;
            (GridIdx2D::new(row, col), *value)
        })
    }

    /// Cells that belong to a zone, i.e. all cells except the no-data ones.
    pub fn zone_cells(&self) -> impl Iterator<Item = (GridIdx2D, i32)> + '_ {
        let no_data_value = self.no_data_value;
        self.indexed_cells()
            .filter(move |(_, value)| *value != no_data_value)
    }

    pub fn zone_cell_count(&self, zone: i32) -> usize {
        self.data.iter().filter(|value| **value == zone).count()
    }

    pub fn zone_ids(&self) -> BTreeSet<i32> {
        self.zone_cells().map(|(_, value)| value).collect()
    }
}
