use crate::error;
use crate::util::Result;
use gdal::raster::GdalDataType;
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;
use std::str::FromStr;

/// The integer type zone identifiers are burned and stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZoneDataType {
    #[default]
    Int16,
    Int32,
}

impl ZoneDataType {
    /// The type name the array engine uses in schemas and load formats.
    pub fn engine_type_name(self) -> &'static str {
        match self {
            ZoneDataType::Int16 => "int16",
            ZoneDataType::Int32 => "int32",
        }
    }

    pub fn byte_width(self) -> usize {
        match self {
            ZoneDataType::Int16 => 2,
            ZoneDataType::Int32 => 4,
        }
    }

    pub fn min_value(self) -> i64 {
        match self {
            ZoneDataType::Int16 => i64::from(i16::MIN),
            ZoneDataType::Int32 => i64::from(i32::MIN),
        }
    }

    pub fn max_value(self) -> i64 {
        match self {
            ZoneDataType::Int16 => i64::from(i16::MAX),
            ZoneDataType::Int32 => i64::from(i32::MAX),
        }
    }

    pub fn is_valid(self, value: i64) -> bool {
        crate::util::ranges::value_in_range(value, self.min_value(), self.max_value())
    }

    pub fn ensure_valid(self, value: i64) -> Result<()> {
        ensure!(
            self.is_valid(value),
            error::ValueOutOfDataTypeRange {
                value,
                data_type: self
            }
        );
        Ok(())
    }

    /// Appends the little-endian bytes of `value` with this type's width.
    pub fn write_le(self, value: i32, buffer: &mut Vec<u8>) -> Result<()> {
        match self {
            ZoneDataType::Int16 => {
                let value = i16::try_from(value).map_err(|_| {
                    error::ValueOutOfDataTypeRange {
                        value: i64::from(value),
                        data_type: self,
                    }
                    .build()
                })?;
                buffer.extend_from_slice(&value.to_le_bytes());
            }
            ZoneDataType::Int32 => buffer.extend_from_slice(&value.to_le_bytes()),
        }
        Ok(())
    }

    /// Decodes a value written by [`ZoneDataType::write_le`]. Returns `None` if `bytes` has the wrong length.
    pub fn read_le(self, bytes: &[u8]) -> Option<i32> {
        match self {
            ZoneDataType::Int16 => bytes
                .try_into()
                .ok()
                .map(|b: [u8; 2]| i32::from(i16::from_le_bytes(b))),
            ZoneDataType::Int32 => bytes.try_into().ok().map(i32::from_le_bytes),
        }
    }
}

impl fmt::Display for ZoneDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.engine_type_name())
    }
}

impl FromStr for ZoneDataType {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int16" => Ok(ZoneDataType::Int16),
            "int32" => Ok(ZoneDataType::Int32),
            _ => Err(error::Error::UnsupportedZoneDataType { name: s.to_owned() }),
        }
    }
}

/// The cell type of a source raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum RasterDataType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl RasterDataType {
    /// The type name the array engine uses for attributes of this type.
    pub fn engine_type_name(self) -> &'static str {
        match self {
            RasterDataType::U8 => "uint8",
            RasterDataType::U16 => "uint16",
            RasterDataType::U32 => "uint32",
            RasterDataType::U64 => "uint64",
            RasterDataType::I8 => "int8",
            RasterDataType::I16 => "int16",
            RasterDataType::I32 => "int32",
            RasterDataType::I64 => "int64",
            RasterDataType::F32 => "float",
            RasterDataType::F64 => "double",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, RasterDataType::F32 | RasterDataType::F64)
    }
}

impl fmt::Display for RasterDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.engine_type_name())
    }
}

impl TryFrom<GdalDataType> for RasterDataType {
    type Error = error::Error;

    fn try_from(gdal_data_type: GdalDataType) -> Result<Self, Self::Error> {
        match gdal_data_type {
            GdalDataType::UInt8 => Ok(RasterDataType::U8),
            GdalDataType::UInt16 => Ok(RasterDataType::U16),
            GdalDataType::UInt32 => Ok(RasterDataType::U32),
            GdalDataType::UInt64 => Ok(RasterDataType::U64),
            GdalDataType::Int16 => Ok(RasterDataType::I16),
            GdalDataType::Int32 => Ok(RasterDataType::I32),
            GdalDataType::Int64 => Ok(RasterDataType::I64),
            GdalDataType::Float32 => Ok(RasterDataType::F32),
            GdalDataType::Float64 => Ok(RasterDataType::F64),
            other => Err(error::Error::UnsupportedGdalDataType {
                gdal_type: format!("{other:?}"),
            }),
        }
    }
}
