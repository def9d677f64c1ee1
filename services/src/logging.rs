use snafu::ResultExt;
use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, Layer, layer::Filter, prelude::*, registry::LookupSpan};

use crate::config::Logging;
use crate::error::{self, Error, Result};

/// The log spec that `--verbose` enforces.
pub const VERBOSE_LOG_SPEC: &str = "debug";

/// Installs the global subscriber that prints to stderr and routes GDAL's messages into it.
pub fn init_logging(logging_config: &Logging, verbose: bool) -> Result<()> {
    let log_spec = if verbose {
        VERBOSE_LOG_SPEC
    } else {
        logging_config.log_spec.as_str()
    };

    let console_filter = console_filter(log_spec)?;

    tracing_subscriber::Registry::default()
        .with(console_layer_with_filter(console_filter))
        .try_init()
        .map_err(|e| Error::LoggerInstallation {
            reason: e.to_string(),
        })?;

    reroute_gdal_logging();

    Ok(())
}

fn console_filter(log_spec: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(log_spec).context(error::LogSpec { spec: log_spec })
}

fn console_layer_with_filter<S, F: Filter<S> + 'static>(filter: F) -> impl Layer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .pretty()
        .with_file(false)
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(filter)
}

/// We install a GDAL error handler that logs all messages with our log macros.
fn reroute_gdal_logging() {
    gdal::config::set_error_handler(|error_type, error_num, error_msg| {
        const LOG_TARGET: &str = "GDAL";
        match error_type {
            gdal::errors::CplErrType::None => {
                // should never log anything
                tracing::info!(target: LOG_TARGET, "GDAL None {error_num}: {error_msg}");
            }
            gdal::errors::CplErrType::Debug => {
                tracing::debug!(target: LOG_TARGET, "GDAL Debug {error_num}: {error_msg}");
            }
            gdal::errors::CplErrType::Warning => {
                tracing::warn!(target: LOG_TARGET, "GDAL Warning {error_num}: {error_msg}");
            }
            gdal::errors::CplErrType::Failure => {
                tracing::error!(target: LOG_TARGET, "GDAL Failure {error_num}: {error_msg}");
            }
            gdal::errors::CplErrType::Fatal => {
                tracing::error!(target: LOG_TARGET, "GDAL Fatal {error_num}: {error_msg}");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_detailed_log_specs() {
        assert!(console_filter("info").is_ok());
        assert!(console_filter("warn,zonalstats_operators=debug").is_ok());
    }

    #[test]
    fn rejects_garbage_log_specs() {
        let error = console_filter("zonalstats=loud").unwrap_err();
        assert!(matches!(error, Error::LogSpec { .. }));
    }
}
