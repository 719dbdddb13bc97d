//! engine::plan
//!
//! Strategy planning: turning a schema and a record into an ordered list of
//! tablet visits.
//!
//! # Architecture
//!
//! A [`Plan`] names one tablet and says how to read it: which column holds
//! the *trait* (the branch matched against) and which holds the *thing* (the
//! branch produced or bound), whether each side is a pattern, and how results
//! leave the scan ([`Mode`]).
//!
//! Four planners produce plan lists:
//!
//! - [`plan_query`] - one plan per constrained relation in a query,
//!   leaf-to-root so the most specific constraints resolve first
//! - [`plan_options`] - every tablet holding values of a base branch,
//!   used when a query has no constraints
//! - [`plan_values`] - the crown of a base, root-to-leaf, for hydration
//! - [`plan_mutation`] - every tablet a mutation of a base may touch
//!
//! # Invariants
//!
//! - Planners do not perform I/O
//! - Every branch a record names is declared and connected to its parent
//!   record's base; anything else is an error, never skipped
//!
//! # Example
//!
//! ```
//! use arbordb::core::paths::DatasetPaths;
//! use arbordb::core::record::Record;
//! use arbordb::core::schema::Schema;
//! use arbordb::engine::plan::plan_query;
//! use serde_json::json;
//!
//! let schema = Schema::from_pairs([("datum", "actname"), ("datum", "actdate")]).unwrap();
//! let paths = DatasetPaths::new("/data");
//! let query = Record::from_json(&json!({"_": "datum", "actname": "name1"})).unwrap().expand();
//!
//! let plans = plan_query(&schema, &paths, &query).unwrap();
//! assert_eq!(plans.len(), 1);
//! assert_eq!(plans[0].thing_branch.as_str(), "datum");
//! assert!(plans[0].trait_is_regex);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::paths::DatasetPaths;
use crate::core::record::{Record, Value};
use crate::core::schema::{Schema, SchemaError};
use crate::core::types::BranchName;

/// Errors from planning.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A record field names a branch that is neither a leaf nor a trunk of
    /// the record's base.
    #[error("branch '{branch}' is not a leaf or trunk of '{base}'")]
    NotConnected { base: String, branch: String },

    /// A mutation names a trunk below the top-level record. Only the
    /// top-level record's trunk tablets are rewritten.
    #[error("trunk '{trunk}' of nested '{base}' cannot be written")]
    NestedTrunk { base: String, trunk: String },

    /// A mutation gives an inline trunk more than its key.
    #[error("inline trunk '{trunk}' may only carry its key")]
    TrunkWithFields { trunk: String },
}

/// Which tablet column holds the plan's trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    First,
    Second,
}

/// How a scan releases its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The thing is the first column: fold each sorted group and flush it the
    /// moment the first column changes.
    Eager,
    /// Emit each distinct result once, tracking a seen set across groups.
    Accumulating,
    /// Emit every hydrated match; with no match, emit the incoming record
    /// unchanged.
    Passthrough,
}

impl Mode {
    /// Whether unmatched records are dropped.
    pub fn is_filter(self) -> bool {
        !matches!(self, Mode::Passthrough)
    }
}

/// One tablet visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub tablet: PathBuf,
    /// Branch of the tablet's first column.
    pub trunk: BranchName,
    /// Branch of the tablet's second column.
    pub leaf: BranchName,
    pub trait_branch: BranchName,
    pub thing_branch: BranchName,
    pub trait_column: Column,
    pub trait_is_regex: bool,
    pub thing_is_regex: bool,
    pub mode: Mode,
}

impl Plan {
    /// Visit `trunk-leaf` matching leaf values and binding trunk keys.
    pub fn bind_trunk(
        paths: &DatasetPaths,
        trunk: &BranchName,
        leaf: &BranchName,
        mode: Mode,
    ) -> Self {
        Self {
            tablet: paths.tablet_path(trunk, leaf),
            trunk: trunk.clone(),
            leaf: leaf.clone(),
            trait_branch: leaf.clone(),
            thing_branch: trunk.clone(),
            trait_column: Column::Second,
            trait_is_regex: false,
            thing_is_regex: false,
            mode,
        }
    }

    /// Visit `trunk-leaf` matching trunk keys and binding leaf values.
    pub fn bind_leaf(
        paths: &DatasetPaths,
        trunk: &BranchName,
        leaf: &BranchName,
        mode: Mode,
    ) -> Self {
        Self {
            tablet: paths.tablet_path(trunk, leaf),
            trunk: trunk.clone(),
            leaf: leaf.clone(),
            trait_branch: trunk.clone(),
            thing_branch: leaf.clone(),
            trait_column: Column::First,
            trait_is_regex: false,
            thing_is_regex: false,
            mode,
        }
    }

    /// Whether the trait is the tablet's trunk column.
    pub fn trait_is_trunk(&self) -> bool {
        self.trait_column == Column::First
    }

    /// Split a tablet row into `(trait, thing)`.
    pub fn split<'r>(&self, first: &'r str, second: &'r str) -> (&'r str, &'r str) {
        match self.trait_column {
            Column::First => (first, second),
            Column::Second => (second, first),
        }
    }

    fn same_visit(&self, other: &Plan) -> bool {
        self.tablet == other.tablet && self.trait_column == other.trait_column
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} [{}{} -> {}{}, {:?}]",
            self.trunk,
            self.leaf,
            self.trait_branch,
            if self.trait_is_regex { "~" } else { "" },
            self.thing_branch,
            if self.thing_is_regex { "~" } else { "" },
            self.mode
        )
    }
}

/// Check that every field in an expanded record is a declared branch
/// connected to the base of the record holding it.
pub fn validate(schema: &Schema, record: &Record) -> Result<(), PlanError> {
    walk_relations(schema, record, &mut |_, _, _| {})
}

/// Check an expanded mutation record against what [`plan_mutation`] covers.
///
/// Trunks may appear inline on the top-level record only, each as a bare
/// key. Anything else would name relations no mutation plan rewrites.
pub fn validate_mutation(schema: &Schema, record: &Record) -> Result<(), PlanError> {
    validate(schema, record)?;
    check_trunks(schema, record, true)
}

fn check_trunks(schema: &Schema, record: &Record, is_root: bool) -> Result<(), PlanError> {
    for (field, value) in record.fields() {
        let is_trunk = schema.is_trunk_of(field, record.base())?;
        if is_trunk && !is_root {
            return Err(PlanError::NestedTrunk {
                base: record.base().to_string(),
                trunk: field.to_string(),
            });
        }
        for item in value.items() {
            let Value::Nested(nested) = item else {
                continue;
            };
            if is_trunk {
                if nested.fields().next().is_some() {
                    return Err(PlanError::TrunkWithFields {
                        trunk: field.to_string(),
                    });
                }
            } else {
                check_trunks(schema, nested, false)?;
            }
        }
    }
    Ok(())
}

/// Walk every `(record base, field branch)` relation, calling `visit` with
/// whether the field is a leaf (`true`) or a trunk (`false`) of the base.
fn walk_relations<F>(schema: &Schema, record: &Record, visit: &mut F) -> Result<(), PlanError>
where
    F: FnMut(&BranchName, &BranchName, bool),
{
    let base = schema.resolve(record.base())?;
    for (field, value) in record.fields() {
        let branch = schema.resolve(field)?;
        let is_leaf = if schema.is_leaf_of(base.as_str(), branch.as_str())? {
            true
        } else if schema.is_trunk_of(branch.as_str(), base.as_str())? {
            false
        } else {
            return Err(PlanError::NotConnected {
                base: base.to_string(),
                branch: branch.to_string(),
            });
        };
        visit(&base, &branch, is_leaf);

        for item in value.items() {
            if let Value::Nested(nested) = item {
                walk_relations(schema, nested, visit)?;
            }
        }
    }
    Ok(())
}

/// Plan a query: one filtering visit per relation the query constrains.
///
/// The query must be expanded. Returns no plans when the query constrains
/// nothing beyond its own key.
pub fn plan_query(
    schema: &Schema,
    paths: &DatasetPaths,
    query: &Record,
) -> Result<Vec<Plan>, PlanError> {
    let mut plans: Vec<Plan> = Vec::new();
    walk_relations(schema, query, &mut |base, branch, is_leaf| {
        let plan = if is_leaf {
            Plan::bind_trunk(paths, base, branch, Mode::Eager)
        } else {
            Plan::bind_leaf(paths, branch, base, Mode::Accumulating)
        };
        if !plans.iter().any(|p| p.same_visit(&plan)) {
            plans.push(plan);
        }
    })?;

    let mut keyed = plans
        .into_iter()
        .map(|plan| -> Result<_, PlanError> {
            Ok((schema.ascending_key(plan.trait_branch.as_str())?, plan))
        })
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    let mut plans: Vec<Plan> = keyed.into_iter().map(|(_, plan)| plan).collect();

    let mut bound: HashSet<BranchName> = HashSet::new();
    for plan in &mut plans {
        plan.trait_is_regex = !bound.contains(&plan.trait_branch);
        plan.thing_is_regex = !bound.contains(&plan.thing_branch);
        bound.insert(plan.trait_branch.clone());
        bound.insert(plan.thing_branch.clone());
    }

    tracing::debug!(
        base = query.base(),
        plans = %plans.iter().map(Plan::to_string).collect::<Vec<_>>().join("; "),
        "planned query"
    );
    Ok(plans)
}

/// Plan option enumeration of `base`: every leaf tablet rooted at it and
/// every trunk tablet leading to it.
pub fn plan_options(
    schema: &Schema,
    paths: &DatasetPaths,
    base: &str,
) -> Result<Vec<Plan>, PlanError> {
    let base = schema.resolve(base)?;
    let mut plans = Vec::new();

    for leaf in schema.leaves(base.as_str())? {
        let mut plan = Plan::bind_trunk(paths, &base, leaf, Mode::Accumulating);
        plan.thing_is_regex = true;
        plans.push(plan);
    }
    for trunk in schema.trunks(base.as_str())? {
        let mut plan = Plan::bind_leaf(paths, trunk, &base, Mode::Accumulating);
        plan.thing_is_regex = true;
        plans.push(plan);
    }
    Ok(plans)
}

/// Plan hydration of `base`: one visit per relation in its crown, ordered so
/// every branch is hydrated after its trunk.
pub fn plan_values(
    schema: &Schema,
    paths: &DatasetPaths,
    base: &str,
) -> Result<Vec<Plan>, PlanError> {
    let base = schema.resolve(base)?;
    let mut crown = schema.crown(base.as_str())?;
    schema.sorted_descending(&mut crown)?;

    let mut plans = Vec::new();
    for branch in &crown {
        for trunk in schema.trunks(branch.as_str())? {
            if *trunk == base || crown.contains(trunk) {
                plans.push(Plan::bind_leaf(paths, trunk, branch, Mode::Passthrough));
            }
        }
    }
    Ok(plans)
}

/// Plan every tablet a mutation of `base` may rewrite, in crown order: the
/// leaf tablets of the base and of every branch in its crown, then the
/// tablets linking the base to its trunks.
pub fn plan_mutation(
    schema: &Schema,
    paths: &DatasetPaths,
    base: &str,
) -> Result<Vec<Plan>, PlanError> {
    let base = schema.resolve(base)?;
    let mut branches = vec![base.clone()];
    branches.extend(schema.crown(base.as_str())?);

    let mut plans = Vec::new();
    for branch in &branches {
        for leaf in schema.leaves(branch.as_str())? {
            plans.push(Plan::bind_leaf(paths, branch, leaf, Mode::Passthrough));
        }
    }
    for trunk in schema.trunks(base.as_str())? {
        plans.push(Plan::bind_leaf(paths, trunk, &base, Mode::Passthrough));
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_pairs([
            ("datum", "actname"),
            ("datum", "actdate"),
            ("datum", "filepath"),
            ("filepath", "moddate"),
        ])
        .unwrap()
    }

    fn query(json: serde_json::Value) -> Record {
        Record::from_json(&json).unwrap().expand()
    }

    fn names(plans: &[Plan]) -> Vec<String> {
        plans
            .iter()
            .map(|p| format!("{}-{}", p.trunk, p.leaf))
            .collect()
    }

    #[test]
    fn query_plans_run_leaf_to_root() {
        let paths = DatasetPaths::new("/d");
        let q = query(json!({"_": "datum", "actname": "n", "filepath": {"moddate": "2020.*"}}));
        let plans = plan_query(&schema(), &paths, &q).unwrap();

        assert_eq!(
            names(&plans),
            vec!["filepath-moddate", "datum-actname", "datum-filepath"]
        );
        assert!(plans.iter().all(|p| p.mode == Mode::Eager));
        // filepath is bound by the first visit, so the last compares literally
        assert!(plans[0].trait_is_regex && plans[0].thing_is_regex);
        assert!(!plans[2].trait_is_regex);
        assert!(!plans[2].thing_is_regex);
    }

    #[test]
    fn trunk_constraint_binds_second_column() {
        let paths = DatasetPaths::new("/d");
        let q = query(json!({"_": "filepath", "datum": "k1"}));
        let plans = plan_query(&schema(), &paths, &q).unwrap();

        assert_eq!(names(&plans), vec!["datum-filepath"]);
        assert_eq!(plans[0].mode, Mode::Accumulating);
        assert!(plans[0].trait_is_trunk());
        assert_eq!(plans[0].split("k1", "f1"), ("k1", "f1"));
    }

    #[test]
    fn unconstrained_query_has_no_plans() {
        let paths = DatasetPaths::new("/d");
        let q = query(json!({"_": "datum", "datum": "k.*"}));
        assert!(plan_query(&schema(), &paths, &q).unwrap().is_empty());
    }

    #[test]
    fn disconnected_and_unknown_branches_are_errors() {
        let paths = DatasetPaths::new("/d");
        let q = query(json!({"_": "datum", "moddate": "x"}));
        assert!(matches!(
            plan_query(&schema(), &paths, &q),
            Err(PlanError::NotConnected { .. })
        ));

        let q = query(json!({"_": "datum", "color": "red"}));
        assert_eq!(
            plan_query(&schema(), &paths, &q),
            Err(PlanError::Schema(SchemaError::UnknownBranch("color".into())))
        );
    }

    #[test]
    fn option_plans_cover_leaves_and_trunks() {
        let paths = DatasetPaths::new("/d");
        let plans = plan_options(&schema(), &paths, "filepath").unwrap();
        assert_eq!(names(&plans), vec!["filepath-moddate", "datum-filepath"]);
        assert!(plans.iter().all(|p| p.thing_branch.as_str() == "filepath"));
        assert!(plans.iter().all(|p| p.thing_is_regex));
    }

    #[test]
    fn value_plans_hydrate_trunk_before_leaf() {
        let paths = DatasetPaths::new("/d");
        let plans = plan_values(&schema(), &paths, "datum").unwrap();
        let order = names(&plans);
        let filepath = order.iter().position(|n| n == "datum-filepath").unwrap();
        let moddate = order.iter().position(|n| n == "filepath-moddate").unwrap();
        assert!(filepath < moddate);
        assert_eq!(order.len(), 4);
        assert!(plans.iter().all(|p| p.mode == Mode::Passthrough));
    }

    #[test]
    fn mutation_records_keep_trunks_at_top_level() {
        let s = schema();
        let ok = query(json!({"_": "filepath", "filepath": "/a", "datum": "k1", "moddate": "m"}));
        assert_eq!(validate_mutation(&s, &ok), Ok(()));

        let trunk_with_leaves = query(json!({
            "_": "filepath",
            "filepath": "/a",
            "datum": {"datum": "k1", "actname": "n"}
        }));
        assert_eq!(
            validate_mutation(&s, &trunk_with_leaves),
            Err(PlanError::TrunkWithFields {
                trunk: "datum".into()
            })
        );

        let nested_trunk = query(json!({
            "_": "datum",
            "datum": "k1",
            "filepath": {"filepath": "/a", "datum": "k2"}
        }));
        assert_eq!(
            validate_mutation(&s, &nested_trunk),
            Err(PlanError::NestedTrunk {
                base: "filepath".into(),
                trunk: "datum".into()
            })
        );
    }

    #[test]
    fn mutation_plans_cover_crown_and_trunks() {
        let paths = DatasetPaths::new("/d");
        assert_eq!(
            names(&plan_mutation(&schema(), &paths, "datum").unwrap()),
            vec!["datum-actdate", "datum-actname", "datum-filepath", "filepath-moddate"]
        );
        assert_eq!(
            names(&plan_mutation(&schema(), &paths, "filepath").unwrap()),
            vec!["filepath-moddate", "datum-filepath"]
        );
    }
}
