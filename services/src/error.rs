use snafu::Snafu;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))] // disables default `Snafu` suffix
pub enum Error {
    #[snafu(display("DataTypeError: {}", source))]
    DataType {
        source: zonalstats_datatypes::error::Error,
    },

    #[snafu(display("{}", source))]
    Operators {
        source: zonalstats_operators::error::Error,
    },

    #[snafu(display("Configuration error: {}", source))]
    Config { source: config::ConfigError },

    #[snafu(display("Cannot read the settings: {}", reason))]
    InvalidSettings { reason: String },

    ConfigLockFailed,

    #[snafu(display("FilePath {} does not exist", path.display()))]
    InputNotFound { path: PathBuf },

    #[snafu(display("Cannot write the report: {}", source))]
    Report { source: csv::Error },

    #[snafu(display("Cannot create the report file `{}`: {}", path.display(), source))]
    ReportFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Invalid log spec `{}`: {}", spec, source))]
    LogSpec {
        spec: String,
        source: tracing_subscriber::filter::ParseError,
    },

    #[snafu(display("Cannot install the logger: {}", reason))]
    LoggerInstallation { reason: String },

    #[snafu(display("Blocking task failed: {}", source))]
    TaskJoin { source: tokio::task::JoinError },
}

impl From<zonalstats_datatypes::error::Error> for Error {
    fn from(datatype_error: zonalstats_datatypes::error::Error) -> Self {
        Self::DataType {
            source: datatype_error,
        }
    }
}

impl From<zonalstats_operators::error::Error> for Error {
    fn from(operators_error: zonalstats_operators::error::Error) -> Self {
        Self::Operators {
            source: operators_error,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(source: config::ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<csv::Error> for Error {
    fn from(source: csv::Error) -> Self {
        Self::Report { source }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(source: tokio::task::JoinError) -> Self {
        Self::TaskJoin { source }
    }
}

impl Error {
    /// Whether reading or burning the zone layer failed.
    pub fn is_geometry_error(&self) -> bool {
        matches!(self, Error::Operators { source } if source.is_geometry_error())
    }

    /// The query or schema text the engine choked on, if any.
    pub fn implicated_text(&self) -> Option<&str> {
        match self {
            Error::Operators { source } => source.implicated_text(),
            _ => None,
        }
    }
}
