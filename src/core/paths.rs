//! core::paths
//!
//! Centralized path routing for dataset storage locations.
//!
//! # Storage Layout
//!
//! A dataset is one directory:
//! - `_-_.csv` - Schema tablet, rows are `(trunk, leaf)` branch names
//! - `.arbor.csv` - Version marker, one row `(arbor, <format version>)`
//! - `<trunk>-<leaf>.csv` - One tablet per trunk/leaf relation
//! - `.arbor/config.toml` - Dataset configuration
//! - `.arbor/lock` - Exclusive mutation lock
//!
//! **Hard rule:** no code outside this module builds dataset file names.
//!
//! # Example
//!
//! ```
//! use arbordb::core::paths::DatasetPaths;
//! use std::path::PathBuf;
//!
//! let paths = DatasetPaths::new("/data/notes");
//! assert_eq!(paths.schema_path(), PathBuf::from("/data/notes/_-_.csv"));
//! ```

use std::path::{Path, PathBuf};

use super::types::{BranchName, SCHEMA_BRANCH};

/// Current on-disk format version written to the version marker.
pub const FORMAT_VERSION: &str = "1";

/// First field of the version marker row.
pub const VERSION_MARKER_NAME: &str = "arbor";

/// Centralized path routing for one dataset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    root: PathBuf,
}

impl DatasetPaths {
    /// Create path routing for the dataset rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The dataset directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The tablet holding the `trunk` -> `leaf` relation.
    ///
    /// # Example
    ///
    /// ```
    /// use arbordb::core::paths::DatasetPaths;
    /// use arbordb::core::types::BranchName;
    /// use std::path::PathBuf;
    ///
    /// let paths = DatasetPaths::new("/data");
    /// let datum = BranchName::new("datum").unwrap();
    /// let actname = BranchName::new("actname").unwrap();
    /// assert_eq!(
    ///     paths.tablet_path(&datum, &actname),
    ///     PathBuf::from("/data/datum-actname.csv")
    /// );
    /// ```
    pub fn tablet_path(&self, trunk: &BranchName, leaf: &BranchName) -> PathBuf {
        self.root.join(Self::tablet_name(trunk, leaf))
    }

    /// File name of the `trunk` -> `leaf` tablet.
    pub fn tablet_name(trunk: &BranchName, leaf: &BranchName) -> String {
        format!("{}-{}.csv", trunk, leaf)
    }

    /// The schema tablet: the relation of the schema pseudo-branch with itself.
    pub fn schema_path(&self) -> PathBuf {
        self.root
            .join(format!("{SCHEMA_BRANCH}-{SCHEMA_BRANCH}.csv"))
    }

    /// The version marker file.
    pub fn version_path(&self) -> PathBuf {
        self.root.join(format!(".{VERSION_MARKER_NAME}.csv"))
    }

    /// Directory for dataset-private state (config, lock).
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".arbor")
    }

    /// The dataset configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join("config.toml")
    }

    /// The mutation lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("lock")
    }

    /// Ensure the dataset directory structure exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.state_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    #[test]
    fn tablet_path_joins_trunk_and_leaf() {
        let paths = DatasetPaths::new("/data");
        assert_eq!(
            paths.tablet_path(&name("filepath"), &name("moddate")),
            PathBuf::from("/data/filepath-moddate.csv")
        );
    }

    #[test]
    fn fixed_files() {
        let paths = DatasetPaths::new("/data");
        assert_eq!(paths.schema_path(), PathBuf::from("/data/_-_.csv"));
        assert_eq!(paths.version_path(), PathBuf::from("/data/.arbor.csv"));
        assert_eq!(
            paths.config_path(),
            PathBuf::from("/data/.arbor/config.toml")
        );
        assert_eq!(paths.lock_path(), PathBuf::from("/data/.arbor/lock"));
    }

    #[test]
    fn ensure_dirs_creates_state_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let paths = DatasetPaths::new(temp.path().join("ds"));
        paths.ensure_dirs().unwrap();
        assert!(paths.state_dir().is_dir());
    }
}
