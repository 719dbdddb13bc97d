//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$ARBOR_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/arbor/config.toml`
//! 3. `~/.arbor/config.toml`
//!
//! # Dataset Config
//!
//! Located at `<dataset>/.arbor/config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing (e.g., the external sort run
//! size must be positive).

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// [output]
/// pretty = true
///
/// [sort]
/// run_lines = 50000
///
/// [write]
/// fsync = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Output defaults
    pub output: Option<OutputConfig>,

    /// External sort settings
    pub sort: Option<SortConfig>,

    /// Tablet write settings
    pub write: Option<WriteConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(sort) = &self.sort {
            sort.validate()?;
        }
        Ok(())
    }
}

/// Dataset configuration.
///
/// # Example
///
/// ```toml
/// [sort]
/// run_lines = 1000000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    /// External sort settings
    pub sort: Option<SortConfig>,

    /// Tablet write settings
    pub write: Option<WriteConfig>,
}

impl DatasetConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(sort) = &self.sort {
            sort.validate()?;
        }
        Ok(())
    }
}

/// Output defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Pretty-print JSON records
    pub pretty: Option<bool>,
}

/// External sort settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SortConfig {
    /// Lines held in memory per sorted run before spilling
    pub run_lines: Option<usize>,
}

impl SortConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.run_lines == Some(0) {
            return Err(ConfigError::InvalidValue(
                "sort.run_lines must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tablet write settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WriteConfig {
    /// fsync temp files before renaming them over tablets
    pub fsync: Option<bool>,
}
