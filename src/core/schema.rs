//! core::schema
//!
//! The schema tree: which branches exist and how they nest.
//!
//! # Architecture
//!
//! The schema is a DAG where:
//! - Nodes are branches
//! - Edges point from a trunk (parent) to a leaf (child)
//! - A branch with no trunk is a root
//!
//! The schema is persisted as the unordered set of `(trunk, leaf)` pairs in
//! the schema tablet and loaded once per operation. After loading it is an
//! immutable value threaded through planning and matching.
//!
//! # Invariants
//!
//! - The trunk/leaf relation is acyclic
//! - Every branch referenced by a query or plan is declared; an unknown
//!   branch is a [`SchemaError::UnknownBranch`], never silently defaulted

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use thiserror::Error;

use super::types::{BranchName, TypeError};

/// Errors from schema construction and lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A branch was referenced that the schema does not declare.
    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    /// The trunk/leaf relation contains a cycle through this branch.
    #[error("schema cycle through branch: {0}")]
    Cycle(String),

    /// A branch was declared as its own trunk.
    #[error("branch cannot be its own trunk: {0}")]
    SelfLoop(String),

    /// A schema row named an invalid branch.
    #[error(transparent)]
    InvalidName(#[from] TypeError),
}

/// Trunks and leaves of one branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchNode {
    /// Parent branches, sorted by name.
    pub trunks: Vec<BranchName>,
    /// Child branches, sorted by name.
    pub leaves: Vec<BranchName>,
}

/// The schema tree model.
///
/// # Example
///
/// ```
/// use arbordb::core::schema::Schema;
///
/// let schema = Schema::from_pairs([("datum", "actname"), ("datum", "actdate")]).unwrap();
///
/// assert!(schema.is_root("datum").unwrap());
/// assert!(schema.is_connected("datum", "actname").unwrap());
/// assert_eq!(schema.crown("datum").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    branches: BTreeMap<BranchName, BranchNode>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from `(trunk, leaf)` pairs.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::InvalidName`] if a pair names an invalid branch
    /// - [`SchemaError::SelfLoop`] / [`SchemaError::Cycle`] if the pairs are not a DAG
    pub fn from_pairs<I, T, L>(pairs: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (T, L)>,
        T: AsRef<str>,
        L: AsRef<str>,
    {
        let mut schema = Self::new();
        for (trunk, leaf) in pairs {
            let trunk = BranchName::new(trunk.as_ref())?;
            let leaf = BranchName::new(leaf.as_ref())?;
            schema.add_edge(trunk, leaf)?;
        }
        if let Some(branch) = schema.find_cycle() {
            return Err(SchemaError::Cycle(branch.to_string()));
        }
        Ok(schema)
    }

    /// Add a trunk/leaf relationship, declaring both branches.
    ///
    /// Adding an edge twice is a no-op.
    pub fn add_edge(&mut self, trunk: BranchName, leaf: BranchName) -> Result<(), SchemaError> {
        if trunk == leaf {
            return Err(SchemaError::SelfLoop(trunk.to_string()));
        }

        let trunk_node = self.branches.entry(trunk.clone()).or_default();
        if let Err(pos) = trunk_node.leaves.binary_search(&leaf) {
            trunk_node.leaves.insert(pos, leaf.clone());
        }

        let leaf_node = self.branches.entry(leaf).or_default();
        if let Err(pos) = leaf_node.trunks.binary_search(&trunk) {
            leaf_node.trunks.insert(pos, trunk);
        }
        Ok(())
    }

    /// Look up a branch node.
    pub fn node(&self, branch: &str) -> Result<&BranchNode, SchemaError> {
        self.branches
            .get(branch)
            .ok_or_else(|| SchemaError::UnknownBranch(branch.to_string()))
    }

    /// Resolve a string to the declared branch name.
    pub fn resolve(&self, branch: &str) -> Result<BranchName, SchemaError> {
        self.branches
            .get_key_value(branch)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| SchemaError::UnknownBranch(branch.to_string()))
    }

    /// Check whether a branch is declared.
    pub fn contains(&self, branch: &str) -> bool {
        self.branches.contains_key(branch)
    }

    /// All declared branches in name order.
    pub fn branches(&self) -> impl Iterator<Item = &BranchName> {
        self.branches.keys()
    }

    /// Whether the schema declares no branches.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Trunks of a branch.
    pub fn trunks(&self, branch: &str) -> Result<&[BranchName], SchemaError> {
        Ok(&self.node(branch)?.trunks)
    }

    /// Leaves of a branch.
    pub fn leaves(&self, branch: &str) -> Result<&[BranchName], SchemaError> {
        Ok(&self.node(branch)?.leaves)
    }

    /// Whether a branch has no trunk.
    pub fn is_root(&self, branch: &str) -> Result<bool, SchemaError> {
        Ok(self.node(branch)?.trunks.is_empty())
    }

    /// Whether `leaf` is a direct leaf of `trunk`.
    pub fn is_leaf_of(&self, trunk: &str, leaf: &str) -> Result<bool, SchemaError> {
        Ok(self.node(trunk)?.leaves.iter().any(|l| l.as_str() == leaf))
    }

    /// Whether `trunk` is a direct trunk of `branch`.
    pub fn is_trunk_of(&self, trunk: &str, branch: &str) -> Result<bool, SchemaError> {
        Ok(self.node(branch)?.trunks.iter().any(|t| t.as_str() == trunk))
    }

    /// Check whether `branch` reaches `base` via one or more trunk hops.
    ///
    /// A branch is never connected to itself.
    pub fn is_connected(&self, base: &str, branch: &str) -> Result<bool, SchemaError> {
        self.node(base)?;
        let mut queue: VecDeque<&BranchName> = self.node(branch)?.trunks.iter().collect();
        let mut seen = HashSet::new();

        while let Some(current) = queue.pop_front() {
            if current.as_str() == base {
                return Ok(true);
            }
            if seen.insert(current) {
                queue.extend(self.node(current.as_str())?.trunks.iter());
            }
        }
        Ok(false)
    }

    /// The crown of `base`: every branch transitively reachable as a leaf.
    ///
    /// Returned in breadth-first order, siblings by name. `base` itself is
    /// not included.
    pub fn crown(&self, base: &str) -> Result<Vec<BranchName>, SchemaError> {
        let mut result = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&BranchName> = self.node(base)?.leaves.iter().collect();

        while let Some(current) = queue.pop_front() {
            if seen.insert(current) {
                result.push(current.clone());
                queue.extend(self.node(current.as_str())?.leaves.iter());
            }
        }
        Ok(result)
    }

    /// Longest trunk-hop distance from `branch` to a root.
    pub fn depth(&self, branch: &str) -> Result<usize, SchemaError> {
        let node = self.node(branch)?;
        let mut depth = 0;
        for trunk in &node.trunks {
            depth = depth.max(self.depth(trunk.as_str())? + 1);
        }
        Ok(depth)
    }

    /// Sort key placing every branch before its trunk.
    ///
    /// Deeper branches come first; ties go to the branch with fewer leaves,
    /// then to name order. Used to walk query constraints leaf-to-root.
    pub fn ascending_key(
        &self,
        branch: &str,
    ) -> Result<(Reverse<usize>, usize, BranchName), SchemaError> {
        let name = self.resolve(branch)?;
        Ok((Reverse(self.depth(branch)?), self.leaves(branch)?.len(), name))
    }

    /// Sort key placing every branch after its trunk.
    ///
    /// Shallower branches come first; ties go to the branch with more leaves,
    /// then to name order. Used to walk hydration root-to-leaf.
    fn descending_key(
        &self,
        branch: &str,
    ) -> Result<(usize, Reverse<usize>, BranchName), SchemaError> {
        let name = self.resolve(branch)?;
        Ok((self.depth(branch)?, Reverse(self.leaves(branch)?.len()), name))
    }

    /// Sort branch names root-to-leaf.
    pub fn sorted_descending(&self, branches: &mut [BranchName]) -> Result<(), SchemaError> {
        let mut keyed = branches
            .iter()
            .map(|branch| self.descending_key(branch.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        keyed.sort();
        for (slot, (_, _, branch)) in branches.iter_mut().zip(keyed) {
            *slot = branch;
        }
        Ok(())
    }

    /// Check if the trunk/leaf relation contains a cycle.
    ///
    /// Returns `Some(branch)` if a cycle is detected starting from that branch.
    pub fn find_cycle(&self) -> Option<BranchName> {
        let mut visited = HashSet::new();
        let mut path = HashSet::new();

        for branch in self.branches.keys() {
            if self.has_cycle_from(branch, &mut visited, &mut path) {
                return Some(branch.clone());
            }
        }
        None
    }

    fn has_cycle_from<'a>(
        &'a self,
        branch: &'a BranchName,
        visited: &mut HashSet<&'a BranchName>,
        path: &mut HashSet<&'a BranchName>,
    ) -> bool {
        if path.contains(branch) {
            return true;
        }
        if !visited.insert(branch) {
            return false;
        }

        path.insert(branch);
        if let Some(node) = self.branches.get(branch) {
            for trunk in &node.trunks {
                if self.has_cycle_from(trunk, visited, path) {
                    return true;
                }
            }
        }
        path.remove(branch);
        false
    }

    /// The persisted form: every `(trunk, leaf)` pair, sorted.
    pub fn to_pairs(&self) -> Vec<(BranchName, BranchName)> {
        self.branches
            .iter()
            .flat_map(|(trunk, node)| {
                node.leaves
                    .iter()
                    .map(move |leaf| (trunk.clone(), leaf.clone()))
            })
            .collect()
    }
}
