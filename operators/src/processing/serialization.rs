//! Binary bulk-load records of zone grids.
//!
//! A record is `(int64 row, int64 col, value)` in little-endian byte order, where the width of
//! `value` is given by the grid's [`ZoneDataType`]. Records are written in row-major order without
//! any header or footer.

use snafu::{ResultExt, ensure};
use std::path::Path;
use zonalstats_datatypes::raster::{GridIdx2D, ZoneDataType, ZoneGrid};

use crate::engine::{AttributeType, LoadFormat};
use crate::error;
use crate::util::Result;

/// Byte width of each of the two index fields of a record.
pub const RECORD_INDEX_WIDTH: usize = 8;

/// Serializes every cell of `grid`, shifting its local index by `offset`.
pub fn serialize(grid: &ZoneGrid, offset: GridIdx2D) -> Result<Vec<u8>> {
    let data_type = grid.data_type();
    let mut buffer = Vec::with_capacity(
        grid.shape().number_of_elements() * record_width(data_type),
    );

    for (idx, value) in grid.indexed_cells() {
        let idx = idx + offset;
        buffer.extend_from_slice(&idx.row().to_le_bytes());
        buffer.extend_from_slice(&idx.col().to_le_bytes());
        data_type.write_le(value, &mut buffer)?;
    }

    Ok(buffer)
}

/// Serializes only the values of `grid` in row-major order, e.g. for a dense `input` of a whole array.
pub fn serialize_values(grid: &ZoneGrid) -> Result<Vec<u8>> {
    let data_type = grid.data_type();
    let mut buffer = Vec::with_capacity(grid.shape().number_of_elements() * data_type.byte_width());

    for value in grid.data() {
        data_type.write_le(*value, &mut buffer)?;
    }

    Ok(buffer)
}

/// Writes the records of [`serialize`] to `path`, replacing an existing file.
pub async fn write_to_file(grid: &ZoneGrid, offset: GridIdx2D, path: &Path) -> Result<()> {
    let bytes = serialize(grid, offset)?;
    tokio::fs::write(path, bytes)
        .await
        .context(error::StagingFile { path })
}

/// The load format matching the records of [`serialize`], e.g. `(int64, int64, int16)`.
pub fn binary_format(data_type: ZoneDataType) -> LoadFormat {
    LoadFormat::new(vec![
        AttributeType::Int64,
        AttributeType::Int64,
        data_type.into(),
    ])
}

/// Decodes records written by [`serialize`].
pub fn deserialize(bytes: &[u8], data_type: ZoneDataType) -> Result<Vec<(GridIdx2D, i32)>> {
    let record_width = record_width(data_type);
    ensure!(
        bytes.len() % record_width == 0,
        error::TruncatedRecords {
            length: bytes.len(),
            record_width
        }
    );

    let records = bytes
        .chunks_exact(record_width)
        .filter_map(|record| {
            let (row, rest) = record.split_at(RECORD_INDEX_WIDTH);
            let (col, value) = rest.split_at(RECORD_INDEX_WIDTH);
            Some((
                GridIdx2D::new(
                    i64::from_le_bytes(row.try_into().ok()?),
                    i64::from_le_bytes(col.try_into().ok()?),
                ),
                data_type.read_le(value)?,
            ))
        })
        .collect();

    Ok(records)
}

fn record_width(data_type: ZoneDataType) -> usize {
    2 * RECORD_INDEX_WIDTH + data_type.byte_width()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::quadrant_zone_grid;
    use pretty_assertions::assert_eq;

    fn shifted(grid: &ZoneGrid, offset: GridIdx2D) -> Vec<(GridIdx2D, i32)> {
        grid.indexed_cells()
            .map(|(idx, value)| (idx + offset, value))
            .collect()
    }

    #[test]
    fn record_layout() {
        let grid = ZoneGrid::new([1, 2].into(), vec![5, -999], ZoneDataType::Int16, -999).unwrap();

        let bytes = serialize(&grid, GridIdx2D::new(3, -1)).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&3_i64.to_le_bytes());
        expected.extend_from_slice(&(-1_i64).to_le_bytes());
        expected.extend_from_slice(&5_i16.to_le_bytes());
        expected.extend_from_slice(&3_i64.to_le_bytes());
        expected.extend_from_slice(&0_i64.to_le_bytes());
        expected.extend_from_slice(&(-999_i16).to_le_bytes());

        assert_eq!(bytes, expected);
    }

    #[test]
    fn restores_cells_for_any_offset() {
        let grid = quadrant_zone_grid().unwrap();

        for offset in [
            GridIdx2D::new(0, 0),
            GridIdx2D::new(4548, 6187),
            GridIdx2D::new(-3, -70),
        ] {
            let bytes = serialize(&grid, offset).unwrap();
            assert_eq!(bytes.len(), 16 * 18);
            assert_eq!(
                deserialize(&bytes, ZoneDataType::Int16).unwrap(),
                shifted(&grid, offset)
            );
        }
    }

    #[test]
    fn int32_records() {
        let grid =
            ZoneGrid::new([2, 1].into(), vec![100_000, -1], ZoneDataType::Int32, -1).unwrap();

        let bytes = serialize(&grid, GridIdx2D::new(-1, 0)).unwrap();

        assert_eq!(bytes.len(), 2 * 20);
        assert_eq!(
            deserialize(&bytes, ZoneDataType::Int32).unwrap(),
            vec![
                (GridIdx2D::new(-1, 0), 100_000),
                (GridIdx2D::new(0, 0), -1)
            ]
        );
    }

    #[test]
    fn truncated_stream() {
        let bytes = serialize(&quadrant_zone_grid().unwrap(), GridIdx2D::default()).unwrap();

        assert!(matches!(
            deserialize(&bytes[..bytes.len() - 1], ZoneDataType::Int16),
            Err(error::Error::TruncatedRecords { .. })
        ));
    }

    #[test]
    fn values_only() {
        let grid = ZoneGrid::new([1, 3].into(), vec![1, 2, 3], ZoneDataType::Int16, -999).unwrap();
        assert_eq!(
            serialize_values(&grid).unwrap(),
            vec![1, 0, 2, 0, 3, 0]
        );
    }

    #[test]
    fn format_matches_data_type() {
        assert_eq!(
            binary_format(ZoneDataType::Int16).to_string(),
            "(int64, int64, int16)"
        );
        assert_eq!(
            binary_format(ZoneDataType::Int32).to_string(),
            "(int64, int64, int32)"
        );
    }

    #[tokio::test]
    async fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.scidb");
        let grid = quadrant_zone_grid().unwrap();

        write_to_file(&grid, GridIdx2D::new(1, 1), &path).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, serialize(&grid, GridIdx2D::new(1, 1)).unwrap());
    }
}
