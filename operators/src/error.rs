use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))] // disables default `Snafu` suffix
pub enum Error {
    #[snafu(display("DataTypeError: {}", source))]
    DataType {
        source: zonalstats_datatypes::error::Error,
    },

    #[snafu(display("GdalError: {}", source))]
    Gdal {
        source: gdal::errors::GdalError,
    },

    #[snafu(display("Cannot read raster `{}`: {}", path.display(), source))]
    RasterUnreadable {
        path: PathBuf,
        source: gdal::errors::GdalError,
    },

    #[snafu(display("Cannot read zone layer `{}`: {}", path.display(), source))]
    ZoneLayerUnreadable {
        path: PathBuf,
        source: gdal::errors::GdalError,
    },

    #[snafu(display("Zone layer `{}` has no features", path.display()))]
    EmptyZoneLayer { path: PathBuf },

    #[snafu(display("Zone layer `{}` has no attribute `{}`", path.display(), field))]
    MissingZoneAttribute { path: PathBuf, field: String },

    #[snafu(display("Staging file `{}` failed: {}", path.display(), source))]
    StagingFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Cannot create a staging directory: {}", source))]
    StagingDirectory { source: std::io::Error },

    #[snafu(display(
        "Binary records of {} bytes cannot be split into records of {} bytes",
        length,
        record_width
    ))]
    TruncatedRecords { length: usize, record_width: usize },

    #[snafu(display(
        "Array `{}` already exists and could not be replaced",
        name
    ))]
    ArraySchemaConflict { name: String },

    #[snafu(display("Array `{}` already exists", name))]
    ArrayExists { name: String },

    #[snafu(display("Array `{}` does not exist", name))]
    UnknownArray { name: String },

    #[snafu(display(
        "Array `{}` has {} dimensions, expected 2: {}",
        name,
        dimensions,
        schema
    ))]
    UnsupportedArrayDimensionality {
        name: String,
        dimensions: usize,
        schema: String,
    },

    #[snafu(display("Unknown strategy mode {}, expected 1, 2 or 3", mode))]
    UnknownStrategyMode { mode: u8 },

    #[snafu(display("Cannot store the empty zone grid as array `{}`", name))]
    EmptyZoneGrid { name: String },

    #[snafu(display("Array `{}` has no attribute `{}`", name, attribute))]
    MissingArrayAttribute { name: String, attribute: String },

    #[snafu(display(
        "Loading `{}` with format `{}` was rejected: {}",
        array,
        format,
        diagnostic
    ))]
    LoadFormatMismatch {
        array: String,
        format: String,
        diagnostic: String,
    },

    #[snafu(display("Query failed: {}\nquery: {}", diagnostic, query))]
    QueryExecution { query: String, diagnostic: String },

    #[snafu(display("Cannot parse the schema description: {}\nschema: {}", reason, raw))]
    SchemaParse { raw: String, reason: String },

    #[snafu(display(
        "Cannot read column `{}` of the result of {}: {}",
        column,
        query,
        reason
    ))]
    QueryResultParse {
        query: String,
        column: String,
        reason: String,
    },

    #[snafu(display("Array engine request failed: {}", source))]
    EngineHttp { source: reqwest::Error },

    #[snafu(display("Invalid array engine url: {}", source))]
    EngineUrl { source: url::ParseError },
}

impl From<zonalstats_datatypes::error::Error> for Error {
    fn from(datatype_error: zonalstats_datatypes::error::Error) -> Self {
        Self::DataType {
            source: datatype_error,
        }
    }
}

impl From<gdal::errors::GdalError> for Error {
    fn from(gdal_error: gdal::errors::GdalError) -> Self {
        Self::Gdal { source: gdal_error }
    }
}

impl Error {
    /// Whether the error belongs to reading or burning the zone layer.
    pub fn is_geometry_error(&self) -> bool {
        matches!(
            self,
            Error::ZoneLayerUnreadable { .. }
                | Error::EmptyZoneLayer { .. }
                | Error::MissingZoneAttribute { .. }
        )
    }

    /// The query or schema text involved in the error, if any.
    pub fn implicated_text(&self) -> Option<&str> {
        match self {
            Error::QueryExecution { query, .. } | Error::QueryResultParse { query, .. } => {
                Some(query)
            }
            Error::SchemaParse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
