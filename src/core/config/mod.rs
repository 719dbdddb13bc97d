//! core::config
//!
//! Layered TOML settings for the store.
//!
//! A value is taken from the first layer that sets it:
//!
//! 1. `<dataset>/.arbor/config.toml`
//! 2. the user file: `$ARBOR_CONFIG`, else `$XDG_CONFIG_HOME/arbor/config.toml`,
//!    else `~/.arbor/config.toml`
//! 3. built-in defaults
//!
//! Command-line flags are applied by the CLI on top of the result. A missing
//! file is simply an absent layer; a file that fails to parse or validate is
//! an error.
//!
//! ```no_run
//! use arbordb::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/data/notes"))).unwrap().config;
//! assert!(config.sort_run_lines() > 0);
//! ```

pub mod schema;

pub use schema::{DatasetConfig, GlobalConfig, OutputConfig, SortConfig, WriteConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::paths::DatasetPaths;

/// Lines per in-memory run of the external sort when nothing overrides it.
pub const DEFAULT_SORT_RUN_LINES: usize = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// What [`Config::load`] found.
#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
}

/// The user and dataset layers, resolved through the accessor methods.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub dataset: Option<DatasetConfig>,
    global_path: Option<PathBuf>,
    dataset_path: Option<PathBuf>,
}

impl Config {
    /// Load the user layer from its usual location, plus the layer of
    /// `dataset` when given.
    pub fn load(dataset: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        Self::load_from(user_config_file().as_deref(), dataset)
    }

    /// Load with an explicit user file. `None` skips the user layer.
    pub fn load_from(
        global_path: Option<&Path>,
        dataset: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let global_path = global_path.filter(|p| p.is_file()).map(Path::to_path_buf);
        let global: GlobalConfig = match &global_path {
            Some(path) => parse_file(path)?,
            None => GlobalConfig::default(),
        };
        global.validate()?;

        let dataset_path = dataset
            .map(|root| DatasetPaths::new(root).config_path())
            .filter(|p| p.is_file());
        let dataset = match &dataset_path {
            Some(path) => {
                let layer: DatasetConfig = parse_file(path)?;
                layer.validate()?;
                Some(layer)
            }
            None => None,
        };

        tracing::debug!(
            global = ?global_path,
            dataset = ?dataset_path,
            "loaded config"
        );
        Ok(ConfigLoadResult {
            config: Config {
                global,
                dataset,
                global_path,
                dataset_path,
            },
        })
    }

    /// Lines per in-memory run of the external sort.
    pub fn sort_run_lines(&self) -> usize {
        self.layered(
            |d| d.sort.as_ref().and_then(|s| s.run_lines),
            |g| g.sort.as_ref().and_then(|s| s.run_lines),
        )
        .unwrap_or(DEFAULT_SORT_RUN_LINES)
    }

    /// Whether temp files are fsynced before they replace a tablet. On by default.
    pub fn fsync(&self) -> bool {
        self.layered(
            |d| d.write.as_ref().and_then(|w| w.fsync),
            |g| g.write.as_ref().and_then(|w| w.fsync),
        )
        .unwrap_or(true)
    }

    /// Whether JSON results are pretty-printed. User layer only.
    pub fn pretty(&self) -> bool {
        self.global
            .output
            .as_ref()
            .and_then(|o| o.pretty)
            .unwrap_or(false)
    }

    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn dataset_config_loaded_from(&self) -> Option<&Path> {
        self.dataset_path.as_deref()
    }

    fn layered<T>(
        &self,
        from_dataset: impl Fn(&DatasetConfig) -> Option<T>,
        from_global: impl Fn(&GlobalConfig) -> Option<T>,
    ) -> Option<T> {
        self.dataset
            .as_ref()
            .and_then(from_dataset)
            .or_else(|| from_global(&self.global))
    }
}

/// First existing user config file, if any.
fn user_config_file() -> Option<PathBuf> {
    let explicit = std::env::var_os("ARBOR_CONFIG").map(PathBuf::from);
    let xdg = std::env::var_os("XDG_CONFIG_HOME")
        .map(|base| PathBuf::from(base).join("arbor").join("config.toml"));
    let home = dirs::home_dir().map(|home| home.join(".arbor").join("config.toml"));

    [explicit, xdg, home]
        .into_iter()
        .flatten()
        .find(|candidate| candidate.is_file())
}

fn parse_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
