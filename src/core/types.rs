//! core::types
//!
//! Validated names shared by the schema, the tablet layout and the engine.
//!
//! ```
//! use arbordb::core::types::BranchName;
//!
//! let branch = BranchName::new("actname").unwrap();
//! assert_eq!(branch.as_str(), "actname");
//! assert!(BranchName::new("act-name").is_err());
//! assert!(BranchName::new("_").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the schema pseudo-branch. Its tablet is the schema file.
pub const SCHEMA_BRANCH: &str = "_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("branch name is empty")]
    EmptyBranch,

    #[error("'_' is reserved for the schema tablet")]
    ReservedBranch,

    #[error("branch name '{name}' contains '{}'", .bad.escape_default())]
    BranchChar { name: String, bad: char },
}

/// Name of a branch in the schema.
///
/// It is spliced verbatim into tablet file names (`<trunk>-<leaf>.csv`), so
/// it may hold only alphanumerics and `_`, and may not be the bare `_`.
///
/// ```
/// use arbordb::core::types::BranchName;
///
/// assert!(BranchName::new("file_path2").is_ok());
/// assert!(BranchName::new("a.b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let bad = name.chars().find(|c| !c.is_alphanumeric() && *c != '_');
        match bad {
            _ if name.is_empty() => Err(TypeError::EmptyBranch),
            _ if name == SCHEMA_BRANCH => Err(TypeError::ReservedBranch),
            Some(bad) => Err(TypeError::BranchChar { name, bad }),
            None => Ok(Self(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(name: String) -> Result<Self, TypeError> {
        Self::new(name)
    }
}

impl TryFrom<&str> for BranchName {
    type Error = TypeError;

    fn try_from(name: &str) -> Result<Self, TypeError> {
        Self::new(name)
    }
}

impl From<BranchName> for String {
    fn from(branch: BranchName) -> String {
        branch.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::borrow::Borrow<str> for BranchName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
