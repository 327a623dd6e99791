//! Environment-driven configuration.
//!
//! Every setting has a default so the sample runs with no environment at
//! all. Defaults that would be wrong in production are logged at `warn`.

use std::path::PathBuf;

use thiserror::Error;

use drivebill_catalog::{Catalog, CatalogError};
use drivebill_observability::{LogFormat, ParseLogFormatError};

use crate::store::{InMemorySlotStore, JsonFileSlotStore, SlotStore, StoreError};

pub const PUBLIC_KEY_VAR: &str = "DRIVEBILL_PUBLIC_KEY";
pub const STATE_FILE_VAR: &str = "DRIVEBILL_STATE_FILE";
pub const TANK_SLOT_VAR: &str = "DRIVEBILL_TANK_SLOT";
pub const CATALOG_VAR: &str = "DRIVEBILL_CATALOG";
pub const LOG_FORMAT_VAR: &str = "DRIVEBILL_LOG_FORMAT";

pub const DEFAULT_TANK_SLOT: &str = "gas";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidLogFormat(#[from] ParseLogFormatError),

    #[error("DRIVEBILL_TANK_SLOT must not be blank")]
    BlankTankSlot,

    #[error("cannot read catalog {path}: {source}")]
    ReadCatalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Licence key forwarded to the gateway's `initialize`.
    pub public_key: String,
    /// JSON file for durable slots; `None` keeps them in memory.
    pub state_file: Option<PathBuf>,
    pub tank_slot: String,
    /// JSON catalog; `None` uses the built-in catalog.
    pub catalog_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            state_file: None,
            tank_slot: DEFAULT_TANK_SLOT.to_string(),
            catalog_path: None,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build from explicit key/value pairs. Unrelated keys are ignored and
    /// empty values count as unset.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();

        for (key, value) in vars {
            let value: String = value.into();
            let value = value.trim();
            if value.is_empty() {
                if key.as_ref() == TANK_SLOT_VAR {
                    return Err(ConfigError::BlankTankSlot);
                }
                continue;
            }

            match key.as_ref() {
                PUBLIC_KEY_VAR => config.public_key = value.to_string(),
                STATE_FILE_VAR => config.state_file = Some(PathBuf::from(value)),
                TANK_SLOT_VAR => config.tank_slot = value.to_string(),
                CATALOG_VAR => config.catalog_path = Some(PathBuf::from(value)),
                LOG_FORMAT_VAR => config.log_format = value.parse()?,
                _ => {}
            }
        }

        Ok(config)
    }

    /// Log the settings that fell back to a default worth knowing about.
    ///
    /// Separate from loading because the log format itself comes from here,
    /// so the subscriber is only installed after the config is read.
    pub fn report_defaults(&self) {
        if self.public_key.is_empty() {
            tracing::warn!(
                "{PUBLIC_KEY_VAR} not set; the gateway will be initialized without a licence key"
            );
        }
        if self.state_file.is_none() {
            tracing::info!("{STATE_FILE_VAR} not set; tank level will not survive a restart");
        }
    }

    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        let Some(path) = &self.catalog_path else {
            return Ok(Catalog::trivial_drive());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadCatalog {
            path: path.clone(),
            source,
        })?;
        let catalog = Catalog::from_json(&text)?;
        tracing::info!(path = %path.display(), products = catalog.entries().len(), "loaded catalog");
        Ok(catalog)
    }

    pub fn open_store(&self) -> Result<Box<dyn SlotStore>, ConfigError> {
        match &self.state_file {
            Some(path) => Ok(Box::new(JsonFileSlotStore::open(path)?)),
            None => Ok(Box::new(InMemorySlotStore::new())),
        }
    }
}
