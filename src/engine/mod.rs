//! engine
//!
//! Query and mutation execution over one dataset.
//!
//! # Architecture
//!
//! A [`Dataset`] is opened once per operation: it loads the configuration,
//! the schema tablet, and the version marker, then answers the core surface:
//!
//! - [`Dataset::select_record`] - matching records, hydrated
//! - [`Dataset::select_option`] - distinct values of a branch
//! - [`Dataset::build_record`] - hydrate caller-supplied base records
//! - [`Dataset::insert_record`] / [`Dataset::update_record`] /
//!   [`Dataset::delete_record`] - mutations
//!
//! Every operation runs the same lifecycle:
//!
//! ```text
//! expand -> validate -> plan -> scan / rewrite -> condense
//! ```
//!
//! # Invariants
//!
//! - The schema is loaded once and never changes during an operation
//! - Mutations hold the dataset lock for the whole call
//! - Tablets are rewritten one at a time; there is no cross-tablet
//!   transaction, so an interrupted mutation can leave earlier tablets in
//!   their new state and later tablets in their old state
//!
//! # Example
//!
//! ```no_run
//! use arbordb::core::record::Record;
//! use arbordb::engine::Dataset;
//! use serde_json::json;
//! use std::path::Path;
//!
//! let dataset = Dataset::open(Path::new("/data/notes"))?;
//! let query = Record::from_json(&json!({"_": "datum", "actname": "name.*"}))?;
//! for record in dataset.select_record(&query)? {
//!     println!("{record}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod matcher;
pub mod mutate;
pub mod plan;
pub mod select;

pub use matcher::{chain, MatchError, Matcher, Patterns, Scan, Step};
pub use mutate::TabletEdit;
pub use plan::{Mode, Plan, PlanError};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::{Config, ConfigError};
use crate::core::ops::LockError;
use crate::core::paths::{DatasetPaths, FORMAT_VERSION, VERSION_MARKER_NAME};
use crate::core::record::Record;
use crate::core::schema::{Schema, SchemaError};
use crate::core::types::BranchName;
use crate::store::tablet::{self, TabletError};
use crate::store::writer::{TabletRewrite, WriteOptions};

/// Errors from dataset operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The directory has no schema tablet.
    #[error("not an arbor dataset: {0} (no schema tablet)")]
    NotADataset(PathBuf),

    /// `init` on a directory that already has a schema.
    #[error("dataset already initialized: {0}")]
    AlreadyInitialized(PathBuf),

    /// `init` with no trunk/leaf pairs.
    #[error("schema must declare at least one trunk/leaf pair")]
    EmptySchema,

    /// A mutation needs a key the record does not carry.
    #[error("record of branch '{branch}' has no key")]
    MissingKey { branch: String },

    /// A key given as a list or a record where one literal is needed.
    #[error("record of branch '{branch}' needs a single literal key")]
    InvalidKey { branch: String },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Tablet(#[from] TabletError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// An open dataset: its location, schema, and configuration.
#[derive(Debug, Clone)]
pub struct Dataset {
    paths: DatasetPaths,
    schema: Schema,
    config: Config,
}

impl Dataset {
    /// Open the dataset in `dir` with configuration from the default
    /// locations.
    pub fn open(dir: &Path) -> Result<Self, EngineError> {
        let config = Config::load(Some(dir))?.config;
        Self::open_with_config(dir, config)
    }

    /// Open the dataset in `dir` with an explicit configuration.
    pub fn open_with_config(dir: &Path, config: Config) -> Result<Self, EngineError> {
        let paths = DatasetPaths::new(dir);
        let schema = load_schema(&paths)?;
        check_version(&paths)?;
        tracing::debug!(
            dataset = %dir.display(),
            branches = schema.branches().count(),
            "opened dataset"
        );
        Ok(Self {
            paths,
            schema,
            config,
        })
    }

    /// Create a dataset in `dir` with the given schema.
    ///
    /// Writes the schema tablet and the version marker.
    ///
    /// # Errors
    ///
    /// - [`EngineError::EmptySchema`] if `pairs` is empty
    /// - [`EngineError::AlreadyInitialized`] if `dir` already has a schema
    /// - [`EngineError::Schema`] if the pairs do not form a DAG
    pub fn init(
        dir: &Path,
        pairs: &[(BranchName, BranchName)],
        config: Config,
    ) -> Result<Self, EngineError> {
        if pairs.is_empty() {
            return Err(EngineError::EmptySchema);
        }
        let paths = DatasetPaths::new(dir);
        if !tablet::is_empty(&paths.schema_path())? {
            return Err(EngineError::AlreadyInitialized(dir.to_path_buf()));
        }
        let schema = Schema::from_pairs(pairs.iter().map(|(t, l)| (t.as_str(), l.as_str())))?;

        paths.ensure_dirs().map_err(|source| EngineError::Io {
            path: paths.state_dir(),
            source,
        })?;
        let options = WriteOptions {
            fsync: config.fsync(),
        };

        let mut rewrite = TabletRewrite::begin(&paths.schema_path(), options)?;
        for (trunk, leaf) in schema.to_pairs() {
            rewrite.write_row(trunk.as_str(), leaf.as_str())?;
        }
        rewrite.commit()?;

        let mut rewrite = TabletRewrite::begin(&paths.version_path(), options)?;
        rewrite.write_row(VERSION_MARKER_NAME, FORMAT_VERSION)?;
        rewrite.commit()?;

        tracing::info!(dataset = %dir.display(), pairs = pairs.len(), "initialized dataset");
        Ok(Self {
            paths,
            schema,
            config,
        })
    }

    pub fn paths(&self) -> &DatasetPaths {
        &self.paths
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            fsync: self.config.fsync(),
        }
    }

    /// Expand a caller record and check it against the schema.
    fn prepare(&self, record: &Record) -> Result<Record, EngineError> {
        let expanded = record.expand();
        plan::validate(&self.schema, &expanded)?;
        Ok(expanded)
    }

    /// Like [`prepare`](Self::prepare), also refusing relations that no
    /// mutation plan of the record's base would write.
    fn prepare_mutation(&self, record: &Record) -> Result<Record, EngineError> {
        let expanded = record.expand();
        plan::validate_mutation(&self.schema, &expanded)?;
        Ok(expanded)
    }
}

fn load_schema(paths: &DatasetPaths) -> Result<Schema, EngineError> {
    let path = paths.schema_path();
    if tablet::is_empty(&path)? {
        return Err(EngineError::NotADataset(paths.root().to_path_buf()));
    }
    let rows = tablet::read_all(&path)?;
    Ok(Schema::from_pairs(rows)?)
}

fn check_version(paths: &DatasetPaths) -> Result<(), EngineError> {
    let rows = tablet::read_all(&paths.version_path())?;
    match rows.iter().find(|(name, _)| name == VERSION_MARKER_NAME) {
        Some((_, version)) if version == FORMAT_VERSION => {}
        Some((_, version)) => tracing::warn!(
            found = %version,
            expected = FORMAT_VERSION,
            "dataset format version differs"
        ),
        None => tracing::debug!("dataset has no version marker"),
    }
    Ok(())
}

/// Select records matching `query` from the dataset in `dir`.
pub fn select_record(dir: &Path, query: &Record) -> Result<Vec<Record>, EngineError> {
    Dataset::open(dir)?.select_record(query)
}

/// Enumerate distinct values of the query's base branch.
pub fn select_option(dir: &Path, query: &Record) -> Result<Vec<Record>, EngineError> {
    Dataset::open(dir)?.select_option(query)
}

/// Hydrate caller-supplied base records.
pub fn build_record(dir: &Path, records: &[Record]) -> Result<Vec<Record>, EngineError> {
    Dataset::open(dir)?.build_record(records)
}

/// Insert records, returning them with assigned keys.
pub fn insert_record(dir: &Path, records: &[Record]) -> Result<Vec<Record>, EngineError> {
    Dataset::open(dir)?.insert_record(records)
}

/// Replace the stored state of keyed records.
pub fn update_record(dir: &Path, records: &[Record]) -> Result<(), EngineError> {
    Dataset::open(dir)?.update_record(records)
}

/// Delete records by key or by query, returning the number of keys removed.
pub fn delete_record(dir: &Path, records: &[Record]) -> Result<usize, EngineError> {
    Dataset::open(dir)?.delete_record(records)
}
