//! engine::matcher
//!
//! The streaming sort-merge matcher.
//!
//! # Architecture
//!
//! A [`Scan`] executes one [`Plan`] against one incoming record as a single
//! left-to-right pass over the plan's tablet. It is pull-driven: each call to
//! `next` reads lines only until the next result is ready.
//!
//! Each line is split into `(trait, thing)` and folded into the record by
//! [`Matcher::step`], a pure function of the *incoming* record. How a step
//! applies depends on how the record's shape relates to the plan, see
//! [`Step`].
//!
//! Scans are chained into a pipeline by [`chain`]: every record a stage
//! emits is fed, as a fresh scan, into the next stage.
//!
//! # Invariants
//!
//! - The tablet is read exactly once per incoming record
//! - The last group is always evaluated at end of file
//! - An empty tablet yields nothing for the first plan of a chain and passes
//!   incoming records through unchanged for every later plan
//! - Records handled here are expanded

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use regex::Regex;
use thiserror::Error;

use super::plan::{Mode, Plan};
use crate::core::grain::{sow, Grain};
use crate::core::record::{Record, Value};
use crate::store::tablet::{self, TabletError, TabletReader};

/// Errors from matching.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Tablet(#[from] TabletError),
}

/// A boxed, pull-driven stream of matched records.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<Record, MatchError>> + 'a>;

/// Compiled pattern cache, shared by every scan of one operation.
///
/// Patterns match whole values: `name.*` is compiled as `^(?:name.*)$`.
#[derive(Debug, Default)]
pub struct Patterns {
    cache: RefCell<HashMap<String, Regex>>,
}

impl Patterns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `value` matches `pattern` in full.
    pub fn is_match(&self, pattern: &str, value: &str) -> Result<bool, MatchError> {
        if let Some(re) = self.cache.borrow().get(pattern) {
            return Ok(re.is_match(value));
        }

        let re = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            MatchError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        let matched = re.is_match(value);
        self.cache.borrow_mut().insert(pattern.to_string(), re);
        Ok(matched)
    }
}

/// How a record relates to a plan, deciding how a line folds into it.
///
/// With `B` the record's base, `T` the plan's trait and `H` its thing,
/// checked in this order:
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `B == H` and the record holds `T` candidates: keep the candidates
    /// matching the trait, bind the key to the thing.
    TraitIsLeaf,
    /// `B == H`, `T` is a trunk of `B` the record does not name: bind the
    /// key to the thing.
    TraitIsTrunk,
    /// `B == H` otherwise: the key itself is the constraint, literal or
    /// pattern, and is replaced by the thing.
    BaseIsThing,
    /// `B == T` and `H` is a leaf of `B`: on a key match, append the thing.
    BaseIsTrait,
    /// The record holds `T` as nested records: step into each.
    NestedTrait,
    /// `T` lives deeper: step into every field, stopping at the first that
    /// matches.
    Deeper,
}

impl Step {
    pub fn classify(plan: &Plan, record: &Record) -> Step {
        let base = record.base();
        let has_trait = base != plan.trait_branch.as_str()
            && record.get(plan.trait_branch.as_str()).is_some();

        if base == plan.thing_branch.as_str() {
            if has_trait {
                Step::TraitIsLeaf
            } else if plan.trait_is_trunk() {
                Step::TraitIsTrunk
            } else {
                Step::BaseIsThing
            }
        } else if base == plan.trait_branch.as_str() && plan.trait_is_trunk() {
            Step::BaseIsTrait
        } else if has_trait {
            Step::NestedTrait
        } else {
            Step::Deeper
        }
    }
}

/// Folds single tablet lines into records for one plan.
#[derive(Clone, Copy)]
pub struct Matcher<'a> {
    plan: &'a Plan,
    patterns: &'a Patterns,
}

impl<'a> Matcher<'a> {
    pub fn new(plan: &'a Plan, patterns: &'a Patterns) -> Self {
        Self { plan, patterns }
    }

    /// Fold one `(trait, thing)` line into `record`.
    ///
    /// Returns the updated record on a match and `None` otherwise. `record`
    /// is never modified.
    pub fn step(
        &self,
        record: &Record,
        trait_value: &str,
        thing_value: &str,
    ) -> Result<Option<Record>, MatchError> {
        match Step::classify(self.plan, record) {
            Step::TraitIsLeaf => self.trait_is_leaf(record, trait_value, thing_value),
            Step::TraitIsTrunk | Step::BaseIsThing => self.bind_key(record, thing_value),
            Step::BaseIsTrait => self.base_is_trait(record, trait_value, thing_value),
            Step::NestedTrait => {
                let branch = self.plan.trait_branch.as_str();
                self.step_field(record, branch, trait_value, thing_value)
            }
            Step::Deeper => {
                for (branch, _) in record.fields() {
                    let updated = self.step_field(record, branch, trait_value, thing_value)?;
                    if updated.is_some() {
                        return Ok(updated);
                    }
                }
                Ok(None)
            }
        }
    }

    fn matches(&self, is_regex: bool, pattern: &str, value: &str) -> Result<bool, MatchError> {
        if is_regex {
            self.patterns.is_match(pattern, value)
        } else {
            Ok(pattern == value)
        }
    }

    /// Whether a candidate's key admits `value`. No key admits anything.
    fn key_admits(
        &self,
        key: Option<&Value>,
        is_regex: bool,
        value: &str,
    ) -> Result<bool, MatchError> {
        let Some(key) = key else {
            return Ok(true);
        };
        for item in key.items() {
            if let Some(pattern) = item.as_key() {
                if self.matches(is_regex, pattern, value)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn bind_key(&self, record: &Record, thing_value: &str) -> Result<Option<Record>, MatchError> {
        if !self.key_admits(record.key(), self.plan.thing_is_regex, thing_value)? {
            return Ok(None);
        }
        let mut out = record.clone();
        out.set_key(thing_value);
        Ok(Some(out))
    }

    fn trait_is_leaf(
        &self,
        record: &Record,
        trait_value: &str,
        thing_value: &str,
    ) -> Result<Option<Record>, MatchError> {
        if !self.key_admits(record.key(), self.plan.thing_is_regex, thing_value)? {
            return Ok(None);
        }
        let branch = self.plan.trait_branch.as_str();
        let Some(field) = record.get(branch) else {
            return Ok(None);
        };

        let mut kept: Option<Value> = None;
        for candidate in field.items() {
            let matched = match candidate {
                Value::Nested(nested) => {
                    if self.key_admits(nested.key(), self.plan.trait_is_regex, trait_value)? {
                        let mut nested = nested.clone();
                        nested.set_key(trait_value);
                        Some(nested)
                    } else {
                        None
                    }
                }
                Value::Literal(pattern) => {
                    if self.matches(self.plan.trait_is_regex, pattern, trait_value)? {
                        Some(Record::new(branch).with_key(trait_value))
                    } else {
                        None
                    }
                }
                Value::List(_) => None,
            };
            if let Some(matched) = matched {
                let matched = Value::Nested(matched);
                kept = Some(match kept {
                    Some(existing) => existing.merge(matched),
                    None => matched,
                });
            }
        }

        let Some(kept) = kept else {
            return Ok(None);
        };
        let mut out = record.clone();
        out.set_key(thing_value);
        out.insert(branch, kept);
        Ok(Some(out))
    }

    fn base_is_trait(
        &self,
        record: &Record,
        trait_value: &str,
        thing_value: &str,
    ) -> Result<Option<Record>, MatchError> {
        let Some(key) = record.key_str() else {
            return Ok(None);
        };
        if !self.matches(self.plan.trait_is_regex, key, trait_value)? {
            return Ok(None);
        }
        let grain = Grain::new(
            self.plan.trait_branch.as_str(),
            key,
            self.plan.thing_branch.as_str(),
            thing_value,
        );
        let mut out = record.clone();
        Ok(sow(&mut out, &grain).then_some(out))
    }

    /// Step into every nested item of one field.
    ///
    /// Filtering plans keep only the items that matched; passthrough plans
    /// keep every item, updated or not.
    fn step_field(
        &self,
        record: &Record,
        branch: &str,
        trait_value: &str,
        thing_value: &str,
    ) -> Result<Option<Record>, MatchError> {
        let Some(field) = record.get(branch) else {
            return Ok(None);
        };
        let keep_unmatched = !self.plan.mode.is_filter();

        let mut matched = false;
        let mut items = Vec::new();
        for item in field.items() {
            let updated = match item {
                Value::Nested(nested) => self.step(nested, trait_value, thing_value)?,
                _ => None,
            };
            match updated {
                Some(updated) => {
                    matched = true;
                    items.push(Value::Nested(updated));
                }
                None if keep_unmatched => items.push(item.clone()),
                None => {}
            }
        }

        if !matched {
            return Ok(None);
        }
        let mut out = record.clone();
        if let Some(value) = Value::from_items(items) {
            out.insert(branch, value);
        }
        Ok(Some(out))
    }
}

/// Fold state of one scan.
#[derive(Debug)]
struct Fold {
    record: Record,
    initial: Record,
    fst: Option<String>,
    is_match: bool,
}

impl Fold {
    fn new(initial: Record) -> Self {
        Self {
            record: initial.clone(),
            initial,
            fst: None,
            is_match: false,
        }
    }

    fn absorb(&mut self, matched: Record) {
        if self.is_match {
            self.record.merge(matched);
        } else {
            self.record = matched;
            self.is_match = true;
        }
    }

    /// Close the current group, returning its record if anything matched.
    fn flush(&mut self) -> Option<Record> {
        let was_match = std::mem::replace(&mut self.is_match, false);
        let record = std::mem::replace(&mut self.record, self.initial.clone());
        was_match.then_some(record)
    }
}

/// One pass of one plan over its tablet for one incoming record.
pub struct Scan<'a> {
    matcher: Matcher<'a>,
    mode: Mode,
    reader: Option<TabletReader>,
    fold: Fold,
    seen: HashSet<Record>,
    pending: VecDeque<Record>,
    done: bool,
}

impl<'a> Scan<'a> {
    /// Open a scan. `first` marks the first plan of a chain.
    pub fn open(
        plan: &'a Plan,
        patterns: &'a Patterns,
        initial: Record,
        first: bool,
    ) -> Result<Self, MatchError> {
        let mut scan = Self {
            matcher: Matcher::new(plan, patterns),
            mode: plan.mode,
            reader: None,
            fold: Fold::new(initial),
            seen: HashSet::new(),
            pending: VecDeque::new(),
            done: false,
        };

        if tablet::is_empty(&plan.tablet)? {
            tracing::debug!(plan = %plan, first, "empty tablet");
            if !first {
                scan.pending.push_back(scan.fold.initial.clone());
            }
            scan.done = true;
            return Ok(scan);
        }

        scan.reader = Some(TabletReader::open(&plan.tablet)?);
        Ok(scan)
    }

    fn feed(&mut self, first: String, second: String) -> Result<(), MatchError> {
        let (trait_value, thing_value) = self.matcher.plan.split(&first, &second);
        let matched = self
            .matcher
            .step(&self.fold.initial, trait_value, thing_value)?;

        match self.mode {
            Mode::Eager => {
                if self.fold.fst.as_deref() != Some(first.as_str()) {
                    if let Some(record) = self.fold.flush() {
                        self.pending.push_back(record);
                    }
                    self.fold.fst = Some(first.clone());
                }
                if let Some(matched) = matched {
                    self.fold.absorb(matched);
                }
            }
            Mode::Accumulating => {
                if let Some(matched) = matched {
                    if self.seen.insert(matched.clone()) {
                        self.pending.push_back(matched);
                    }
                }
            }
            Mode::Passthrough => {
                if let Some(matched) = matched {
                    self.fold.is_match = true;
                    self.pending.push_back(matched);
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        match self.mode {
            Mode::Eager => {
                if let Some(record) = self.fold.flush() {
                    self.pending.push_back(record);
                }
            }
            Mode::Passthrough => {
                if !self.fold.is_match {
                    self.pending.push_back(self.fold.initial.clone());
                }
            }
            Mode::Accumulating => {}
        }
    }
}

impl Iterator for Scan<'_> {
    type Item = Result<Record, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            let line = self.reader.as_mut().and_then(|reader| reader.next());
            match line {
                None => {
                    self.done = true;
                    self.finish();
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                Some(Ok((first, second))) => {
                    if let Err(e) = self.feed(first, second) {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
        }
    }
}

/// One pipeline stage: a fresh scan of `plan` per upstream record.
struct Stage<'a> {
    plan: &'a Plan,
    patterns: &'a Patterns,
    upstream: RecordStream<'a>,
    current: Option<Scan<'a>>,
    first: bool,
}

impl Iterator for Stage<'_> {
    type Item = Result<Record, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(scan) = self.current.as_mut() {
                match scan.next() {
                    Some(item) => return Some(item),
                    None => self.current = None,
                }
            }
            let record = match self.upstream.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };
            match Scan::open(self.plan, self.patterns, record, self.first) {
                Ok(scan) => self.current = Some(scan),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Chain `plans` over a seed record: each plan filters and extends the
/// records produced by the previous one.
pub fn chain<'a>(plans: &'a [Plan], patterns: &'a Patterns, seed: Record) -> RecordStream<'a> {
    let mut stream: RecordStream<'a> = Box::new(std::iter::once(Ok(seed)));
    for (index, plan) in plans.iter().enumerate() {
        stream = Box::new(Stage {
            plan,
            patterns,
            upstream: stream,
            current: None,
            first: index == 0,
        });
    }
    stream
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::DatasetPaths;
    use crate::core::types::BranchName;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn name(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    fn expanded(json: serde_json::Value) -> Record {
        Record::from_json(&json).unwrap().expand()
    }

    fn condensed(records: Vec<Record>) -> Vec<serde_json::Value> {
        records.iter().map(|r| r.condense().to_json()).collect()
    }

    fn run(plan: &Plan, seed: Record, first: bool) -> Vec<Record> {
        let patterns = Patterns::new();
        Scan::open(plan, &patterns, seed, first)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn actname_plan(dir: &TempDir) -> Plan {
        let paths = DatasetPaths::new(dir.path());
        let mut plan = Plan::bind_trunk(&paths, &name("datum"), &name("actname"), Mode::Eager);
        plan.trait_is_regex = true;
        plan.thing_is_regex = true;
        plan
    }

    #[test]
    fn patterns_match_whole_values() {
        let patterns = Patterns::new();
        assert!(patterns.is_match("name.*", "name1").unwrap());
        assert!(!patterns.is_match("name", "name1").unwrap());
        assert!(!patterns.is_match("ame1", "name1").unwrap());
        assert!(matches!(
            patterns.is_match("(", "x"),
            Err(MatchError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn classify_covers_each_case() {
        let dir = TempDir::new().unwrap();
        let paths = DatasetPaths::new(dir.path());
        let to_trunk = Plan::bind_trunk(&paths, &name("datum"), &name("actname"), Mode::Eager);
        let to_leaf = Plan::bind_leaf(&paths, &name("datum"), &name("filepath"), Mode::Passthrough);
        let deep = Plan::bind_leaf(&paths, &name("filepath"), &name("moddate"), Mode::Passthrough);

        let with_actname = expanded(json!({"_": "datum", "actname": "n"}));
        let bare = expanded(json!({"_": "datum", "datum": "k"}));
        let with_filepath = expanded(json!({"_": "datum", "datum": "k", "filepath": "f"}));
        let filepath = expanded(json!({"_": "filepath", "filepath": "f"}));

        assert_eq!(Step::classify(&to_trunk, &with_actname), Step::TraitIsLeaf);
        assert_eq!(Step::classify(&to_trunk, &bare), Step::BaseIsThing);
        assert_eq!(Step::classify(&to_leaf, &filepath), Step::TraitIsTrunk);
        assert_eq!(Step::classify(&to_leaf, &bare), Step::BaseIsTrait);
        assert_eq!(Step::classify(&deep, &with_filepath), Step::NestedTrait);
        assert_eq!(Step::classify(&deep, &bare), Step::Deeper);
    }

    #[test]
    fn base_is_trait_sows_thing_under_matching_key() {
        let dir = TempDir::new().unwrap();
        let paths = DatasetPaths::new(dir.path());
        let plan = Plan::bind_leaf(&paths, &name("datum"), &name("filepath"), Mode::Passthrough);
        let patterns = Patterns::new();
        let matcher = Matcher::new(&plan, &patterns);

        let seed = expanded(json!({"_": "datum", "datum": "k1", "actname": "n"}));
        let once = matcher.step(&seed, "k1", "/a").unwrap().unwrap();
        let twice = matcher.step(&once, "k1", "/b").unwrap().unwrap();
        assert_eq!(
            twice.condense().to_json(),
            json!({"_": "datum", "datum": "k1", "actname": "n", "filepath": ["/a", "/b"]})
        );
        assert_eq!(matcher.step(&seed, "k2", "/a").unwrap(), None);
        assert_eq!(seed.get("filepath"), None);
    }

    #[test]
    fn eager_scan_groups_by_first_column() {
        let dir = TempDir::new().unwrap();
        let plan = actname_plan(&dir);
        fs::write(&plan.tablet, "k1,name1\nk1,other\nk2,name2\nk2,name3\nk3,x\n").unwrap();

        let out = run(&plan, expanded(json!({"_": "datum", "actname": "name.*"})), true);
        assert_eq!(
            condensed(out),
            vec![
                json!({"_": "datum", "datum": "k1", "actname": "name1"}),
                json!({"_": "datum", "datum": "k2", "actname": ["name2", "name3"]}),
            ]
        );
    }

    #[test]
    fn last_group_is_flushed_at_end_of_file() {
        let dir = TempDir::new().unwrap();
        let plan = actname_plan(&dir);
        fs::write(&plan.tablet, "k1,a\nk2,b\n").unwrap();

        let out = run(&plan, expanded(json!({"_": "datum", "actname": "b"})), true);
        assert_eq!(condensed(out), vec![json!({"_": "datum", "datum": "k2", "actname": "b"})]);
    }

    #[test]
    fn list_candidates_are_alternatives() {
        let dir = TempDir::new().unwrap();
        let plan = actname_plan(&dir);
        fs::write(&plan.tablet, "k1,a\nk2,b\nk3,c\n").unwrap();

        let out = run(&plan, expanded(json!({"_": "datum", "actname": ["a", "c"]})), true);
        let keys: Vec<_> = out.iter().map(|r| r.key_str().unwrap().to_string()).collect();
        assert_eq!(keys, vec!["k1", "k3"]);
    }

    #[test]
    fn bound_key_restricts_groups() {
        let dir = TempDir::new().unwrap();
        let mut plan = actname_plan(&dir);
        plan.thing_is_regex = false;
        fs::write(&plan.tablet, "k1,a\nk2,a\n").unwrap();

        let out = run(&plan, expanded(json!({"_": "datum", "datum": "k2", "actname": "a"})), true);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key_str(), Some("k2"));
    }

    #[test]
    fn empty_tablet_depends_on_chain_position() {
        let dir = TempDir::new().unwrap();
        let plan = actname_plan(&dir);
        let seed = expanded(json!({"_": "datum", "actname": "a"}));

        assert!(run(&plan, seed.clone(), true).is_empty());
        assert_eq!(run(&plan, seed.clone(), false), vec![seed.clone()]);

        fs::write(&plan.tablet, "").unwrap();
        assert!(run(&plan, seed.clone(), true).is_empty());
    }

    #[test]
    fn accumulating_scan_emits_each_value_once() {
        let dir = TempDir::new().unwrap();
        let paths = DatasetPaths::new(dir.path());
        let mut plan = Plan::bind_leaf(&paths, &name("datum"), &name("actname"), Mode::Accumulating);
        plan.thing_is_regex = true;
        let mut options = Plan::bind_trunk(&paths, &name("datum"), &name("actname"), Mode::Accumulating);
        options.thing_is_regex = true;
        fs::write(&plan.tablet, "k1,x\nk1,y\nk2,x\nk3,y\n").unwrap();

        // enumerate datum keys through the leaf tablet
        let out = run(&options, expanded(json!({"_": "datum"})), true);
        let keys: Vec<_> = out.iter().map(|r| r.key_str().unwrap().to_string()).collect();
        assert_eq!(keys, vec!["k1", "k2", "k3"]);

        // enumerate actname values through the same tablet
        let out = run(&plan, expanded(json!({"_": "actname"})), true);
        let values: Vec<_> = out.iter().map(|r| r.key_str().unwrap().to_string()).collect();
        assert_eq!(values, vec!["x", "y"]);
    }

    #[test]
    fn passthrough_hydrates_or_passes_unchanged() {
        let dir = TempDir::new().unwrap();
        let paths = DatasetPaths::new(dir.path());
        let plan = Plan::bind_leaf(&paths, &name("datum"), &name("actname"), Mode::Passthrough);
        fs::write(&plan.tablet, "k1,a\nk1,b\nk2,c\n").unwrap();

        let out = run(&plan, expanded(json!({"_": "datum", "datum": "k1"})), true);
        assert_eq!(out.len(), 2);
        let mut merged = out[0].clone();
        merged.merge(out[1].clone());
        assert_eq!(
            merged.condense().to_json(),
            json!({"_": "datum", "datum": "k1", "actname": ["a", "b"]})
        );

        let seed = expanded(json!({"_": "datum", "datum": "k9"}));
        assert_eq!(run(&plan, seed.clone(), true), vec![seed]);
    }

    #[test]
    fn nested_trait_updates_matching_item_only() {
        let dir = TempDir::new().unwrap();
        let paths = DatasetPaths::new(dir.path());
        let plan = Plan::bind_leaf(&paths, &name("filepath"), &name("moddate"), Mode::Passthrough);
        fs::write(&plan.tablet, "f2,2020\n").unwrap();

        let seed = expanded(json!({"_": "datum", "datum": "k", "filepath": ["f1", "f2"]}));
        let out = run(&plan, seed, true);
        assert_eq!(
            condensed(out),
            vec![json!({
                "_": "datum",
                "datum": "k",
                "filepath": ["f1", {"_": "filepath", "filepath": "f2", "moddate": "2020"}]
            })]
        );
    }

    #[test]
    fn chained_plans_intersect_nested_constraints() {
        let dir = TempDir::new().unwrap();
        let paths = DatasetPaths::new(dir.path());
        fs::write(paths.root().join("filepath-moddate.csv"), "f1,2020\nf2,2021\nf3,2020\n").unwrap();
        fs::write(paths.root().join("datum-filepath.csv"), "k1,f1\nk2,f2\nk3,f3\n").unwrap();

        let mut moddate = Plan::bind_trunk(&paths, &name("filepath"), &name("moddate"), Mode::Eager);
        moddate.trait_is_regex = true;
        moddate.thing_is_regex = true;
        let filepath = Plan::bind_trunk(&paths, &name("datum"), &name("filepath"), Mode::Eager);
        let plans = vec![moddate, filepath];

        let patterns = Patterns::new();
        let seed = expanded(json!({"_": "datum", "filepath": {"moddate": "2020"}}));
        let out: Vec<Record> = chain(&plans, &patterns, seed)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            condensed(out),
            vec![
                json!({"_": "datum", "datum": "k1", "filepath": {"_": "filepath", "filepath": "f1", "moddate": "2020"}}),
                json!({"_": "datum", "datum": "k3", "filepath": {"_": "filepath", "filepath": "f3", "moddate": "2020"}}),
            ]
        );
    }

    #[test]
    fn malformed_line_surfaces_as_error() {
        let dir = TempDir::new().unwrap();
        let plan = actname_plan(&dir);
        fs::write(&plan.tablet, "k1,a\nbroken\n").unwrap();

        let patterns = Patterns::new();
        let result: Result<Vec<_>, _> =
            Scan::open(&plan, &patterns, expanded(json!({"_": "datum", "actname": ".*"})), true)
                .unwrap()
                .collect();
        assert!(matches!(
            result,
            Err(MatchError::Tablet(TabletError::MalformedLine { line_no: 2, .. }))
        ));
    }
}
