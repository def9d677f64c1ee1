use crate::error::{self, Error, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use snafu::ResultExt;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use url::Url;
use zonalstats_datatypes::raster::ZoneDataType;
use zonalstats_operators::engine::ShimCredentials;
use zonalstats_operators::processing::ZoneRasterizer;
use zonalstats_operators::strategies::TemporaryArrayNames;

static SETTINGS: LazyLock<Result<RwLock<Config>, ConfigError>> =
    LazyLock::new(|| init_settings().map(RwLock::new));

const DEFAULT_SETTINGS: &str = include_str!("../Settings-default.toml");

fn init_settings() -> Result<Config, ConfigError> {
    settings_builder(DEFAULT_SETTINGS, Path::new("Settings.toml")).build()
}

/// The embedded defaults, overridden by an optional settings file and then by the environment.
fn settings_builder(defaults: &str, settings_file: &Path) -> ConfigBuilder<DefaultState> {
    Config::builder()
        .add_source(File::from_str(defaults, FileFormat::Toml))
        .add_source(File::from(settings_file).required(false))
        // Override config with environment variables that start with `ZONALSTATS__`,
        // e.g. `ZONALSTATS__ENGINE__URL=http://scidb:8080`
        // Note: Since variables contain underscores, we need to use something different
        // for separating groups, for instance double underscores `__`
        .add_source(Environment::with_prefix("zonalstats").separator("__"))
}

pub fn get_config<'a, T>(key: &str) -> Result<T>
where
    T: Deserialize<'a>,
{
    let settings = SETTINGS.as_ref().map_err(|e| Error::InvalidSettings {
        reason: e.to_string(),
    })?;

    settings
        .read()
        .map_err(|_error| Error::ConfigLockFailed)?
        .get::<T>(key)
        .context(error::Config)
}

pub fn get_config_element<'a, T>() -> Result<T>
where
    T: ConfigElement + Deserialize<'a>,
{
    get_config(T::KEY)
}

pub trait ConfigElement {
    const KEY: &'static str;
}

/// Where the array engine lives and how files get into it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Engine {
    pub url: Url,
    pub user: Option<String>,
    pub password: Option<String>,
    pub load_directory: Option<PathBuf>,
}

impl Engine {
    /// Credentials for the shim, if a user is configured.
    pub fn credentials(&self) -> Option<ShimCredentials> {
        self.user.as_ref().map(|user| ShimCredentials {
            user: user.clone(),
            password: self.password.clone().unwrap_or_default(),
        })
    }
}

impl ConfigElement for Engine {
    const KEY: &'static str = "engine";
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Arrays {
    pub direct_join: String,
    pub equi_join: String,
    pub mask: String,
    pub staging: String,
    pub value_attribute: Option<String>,
}

impl ConfigElement for Arrays {
    const KEY: &'static str = "arrays";
}

impl From<&Arrays> for TemporaryArrayNames {
    fn from(arrays: &Arrays) -> Self {
        Self {
            direct_join: arrays.direct_join.clone(),
            equi_join: arrays.equi_join.clone(),
            mask: arrays.mask.clone(),
            staging: arrays.staging.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Rasterization {
    pub id_field: String,
    pub no_data_value: i32,
    pub data_type: ZoneDataType,
}

impl ConfigElement for Rasterization {
    const KEY: &'static str = "rasterization";
}

impl From<Rasterization> for ZoneRasterizer {
    fn from(rasterization: Rasterization) -> Self {
        Self {
            id_field: rasterization.id_field,
            no_data_value: rasterization.no_data_value,
            data_type: rasterization.data_type,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Logging {
    pub log_spec: String,
}

impl ConfigElement for Logging {
    const KEY: &'static str = "logging";
}
