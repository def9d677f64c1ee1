use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};
use zonalstats_datatypes::raster::{GridBoundingBox2D, RasterDataType, ZoneDataType};

/// Largest coordinate the array engine accepts, also used for unbounded (`*`) dimension ends.
pub const MAX_COORDINATE: i64 = (1 << 62) - 1;
/// Smallest coordinate the array engine accepts.
pub const MIN_COORDINATE: i64 = -MAX_COORDINATE;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
    Datetime,
}

impl AttributeType {
    /// Byte width in binary load formats, `None` for variable sized types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            AttributeType::Bool | AttributeType::Int8 | AttributeType::Uint8 => Some(1),
            AttributeType::Int16 | AttributeType::Uint16 => Some(2),
            AttributeType::Int32 | AttributeType::Uint32 | AttributeType::Float => Some(4),
            AttributeType::Int64
            | AttributeType::Uint64
            | AttributeType::Double
            | AttributeType::Datetime => Some(8),
            AttributeType::String => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, AttributeType::String | AttributeType::Datetime)
    }
}

impl From<ZoneDataType> for AttributeType {
    fn from(data_type: ZoneDataType) -> Self {
        match data_type {
            ZoneDataType::Int16 => AttributeType::Int16,
            ZoneDataType::Int32 => AttributeType::Int32,
        }
    }
}

impl From<RasterDataType> for AttributeType {
    fn from(data_type: RasterDataType) -> Self {
        match data_type {
            RasterDataType::U8 => AttributeType::Uint8,
            RasterDataType::U16 => AttributeType::Uint16,
            RasterDataType::U32 => AttributeType::Uint32,
            RasterDataType::U64 => AttributeType::Uint64,
            RasterDataType::I8 => AttributeType::Int8,
            RasterDataType::I16 => AttributeType::Int16,
            RasterDataType::I32 => AttributeType::Int32,
            RasterDataType::I64 => AttributeType::Int64,
            RasterDataType::F32 => AttributeType::Float,
            RasterDataType::F64 => AttributeType::Double,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
    pub nullable: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            nullable: true,
        }
    }
}

impl<S: Into<String>> From<(S, AttributeType)> for Attribute {
    fn from((name, attribute_type): (S, AttributeType)) -> Self {
        Self::new(name, attribute_type)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.attribute_type)?;
        if !self.nullable {
            f.write_str(" NOT NULL")?;
        }
        Ok(())
    }
}

/// A dimension `name=low:high:overlap:chunk_length`.
///
/// `high` and `chunk_length` may be left open (`*`) and are then chosen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDescriptor {
    pub name: String,
    pub low: i64,
    pub high: Option<i64>,
    pub overlap: i64,
    pub chunk_length: Option<i64>,
}

impl DimensionDescriptor {
    pub fn new(
        name: impl Into<String>,
        low: i64,
        high: Option<i64>,
        overlap: i64,
        chunk_length: Option<i64>,
    ) -> Self {
        Self {
            name: name.into(),
            low,
            high,
            overlap,
            chunk_length,
        }
    }

    /// The largest coordinate of this dimension, `MAX_COORDINATE` if unbounded.
    pub fn high_or_max(&self) -> i64 {
        self.high.unwrap_or(MAX_COORDINATE)
    }

    pub fn contains(&self, coordinate: i64) -> bool {
        coordinate >= self.low && coordinate <= self.high_or_max()
    }
}

impl fmt::Display for DimensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.name)?;
        if self.low <= MIN_COORDINATE {
            f.write_str("*")?;
        } else {
            write!(f, "{}", self.low)?;
        }
        match self.high {
            Some(high) => write!(f, ":{high}")?,
            None => f.write_str(":*")?,
        }
        write!(f, ":{}", self.overlap)?;
        match self.chunk_length {
            Some(chunk_length) => write!(f, ":{chunk_length}"),
            None => f.write_str(":*"),
        }
    }
}

/// The declared schema of an array: `<attributes> [dimensions]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySchema {
    pub attributes: Vec<Attribute>,
    pub dimensions: Vec<DimensionDescriptor>,
}

impl ArraySchema {
    pub fn new(attributes: Vec<Attribute>, dimensions: Vec<DimensionDescriptor>) -> Self {
        Self {
            attributes,
            dimensions,
        }
    }

    /// A schema with the same dimensions but different attributes.
    #[must_use]
    pub fn with_attributes(&self, attributes: Vec<Attribute>) -> Self {
        Self::new(attributes, self.dimensions.clone())
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionDescriptor> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    pub fn attribute_types(&self) -> Vec<AttributeType> {
        self.attributes.iter().map(|a| a.attribute_type).collect()
    }

    /// The inclusive bounds of a two dimensional array as `[dim0, dim1]` ~ `[row, col]`.
    ///
    /// Returns `None` for arrays with more or less than two dimensions.
    pub fn bounds_2d(&self) -> Option<GridBoundingBox2D> {
        match self.dimensions.as_slice() {
            [rows, cols] => Some(GridBoundingBox2D::new_unchecked(
                [rows.low, cols.low],
                [rows.high_or_max(), cols.high_or_max()],
            )),
            _ => None,
        }
    }
}

impl fmt::Display for ArraySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}> [{}]",
            self.attributes.iter().join(", "),
            self.dimensions.iter().join("; ")
        )
    }
}

/// A binary load format, i.e. the type of each fixed width field of a record, e.g. `(int64, int64, int16)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFormat {
    pub types: Vec<AttributeType>,
}

impl LoadFormat {
    pub fn new(types: Vec<AttributeType>) -> Self {
        Self { types }
    }

    /// Byte width of one record, `None` if a field has no fixed width.
    pub fn record_width(&self) -> Option<usize> {
        self.types.iter().map(|t| t.fixed_width()).sum()
    }

    /// Whether records of this format fill exactly the attributes of `schema`, in order.
    pub fn matches(&self, schema: &ArraySchema) -> bool {
        self.types == schema.attribute_types()
    }
}

impl fmt::Display for LoadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.types.iter().join(", "))
    }
}
