//! engine::mutate
//!
//! Insert, update, and delete.
//!
//! Every mutation holds the dataset lock for the whole call and handles its
//! records one at a time, in order. Each touched tablet is rewritten in full
//! through [`TabletRewrite`], so a tablet is always either entirely old or
//! entirely new.
//!
//! Inserts append rows to a scratch copy and sort it back. Updates and
//! deletes describe their change as a [`TabletEdit`] and apply it in a
//! single merge pass over the sorted tablet.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::matcher::Patterns;
use super::plan::{plan_mutation, Plan};
use super::{Dataset, EngineError};
use crate::core::grain::mow;
use crate::core::keys::random_key;
use crate::core::ops::DatasetLock;
use crate::core::record::{Record, Value};
use crate::store::codec::encode_line;
use crate::store::sort;
use crate::store::tablet::{self, Row, TabletError, TabletReader};
use crate::store::writer::{TabletRewrite, WriteOptions};

/// A change to one tablet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabletEdit {
    /// First-column values whose rows are replaced by the given seconds.
    pub replace: BTreeMap<String, BTreeSet<String>>,
    /// Second-column values whose rows are dropped.
    pub drop_second: BTreeSet<String>,
    /// Rows to add.
    pub add: BTreeSet<Row>,
}

impl TabletEdit {
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.drop_second.is_empty() && self.add.is_empty()
    }

    /// Rewrite `tablet` with this edit applied.
    ///
    /// Existing rows are streamed in order, dropped rows are skipped, and new
    /// rows are merged in at their sorted position. Returns whether the
    /// tablet was replaced.
    pub fn apply(&self, tablet: &Path, options: WriteOptions) -> Result<bool, TabletError> {
        let mut inserts: BTreeSet<(&str, &str)> = self
            .add
            .iter()
            .map(|(first, second)| (first.as_str(), second.as_str()))
            .collect();
        for (first, seconds) in &self.replace {
            for second in seconds {
                inserts.insert((first.as_str(), second.as_str()));
            }
        }
        if inserts.is_empty() && tablet::is_empty(tablet)? {
            return Ok(false);
        }

        let mut out = UniqueRows::new(TabletRewrite::begin(tablet, options)?);
        let mut inserts = inserts.into_iter().peekable();
        for row in TabletReader::open(tablet)? {
            let (first, second) = row?;
            if self.replace.contains_key(&first) || self.drop_second.contains(&second) {
                continue;
            }
            while let Some(&(a, b)) = inserts.peek() {
                if (a, b) >= (first.as_str(), second.as_str()) {
                    break;
                }
                out.write(a, b)?;
                inserts.next();
            }
            out.write(&first, &second)?;
        }
        for (a, b) in inserts {
            out.write(a, b)?;
        }
        out.rewrite.commit()
    }
}

/// Rewrite sink that drops a row equal to the one before it.
struct UniqueRows {
    rewrite: TabletRewrite,
    last: Option<Row>,
}

impl UniqueRows {
    fn new(rewrite: TabletRewrite) -> Self {
        Self {
            rewrite,
            last: None,
        }
    }

    fn write(&mut self, first: &str, second: &str) -> Result<(), TabletError> {
        if let Some((a, b)) = &self.last {
            if a == first && b == second {
                return Ok(());
            }
        }
        self.rewrite.write_row(first, second)?;
        self.last = Some((first.to_string(), second.to_string()));
        Ok(())
    }
}

impl Dataset {
    /// Insert records, assigning random keys where none is given.
    ///
    /// The root record always receives a key; nested records receive one
    /// when they carry fields but no key. Returns the records as stored.
    pub fn insert_record(&self, records: &[Record]) -> Result<Vec<Record>, EngineError> {
        let _lock = DatasetLock::acquire(&self.paths)?;
        let mut inserted = Vec::with_capacity(records.len());

        for record in records {
            let mut record = self.prepare_mutation(record)?;
            assign_keys(&mut record, true);
            check_literal_keys(&record)?;

            let plans = plan_mutation(&self.schema, &self.paths, record.base())?;
            let mut touched = 0;
            for plan in &plans {
                let rows: BTreeSet<Row> = mow(&record, plan.trunk.as_str(), plan.leaf.as_str())
                    .into_iter()
                    .map(|grain| (grain.trait_value, grain.thing_value))
                    .collect();
                if rows.is_empty() {
                    continue;
                }
                self.append_rows(&plan.tablet, &rows)?;
                touched += 1;
            }

            tracing::info!(
                base = record.base(),
                key = record.key_str().unwrap_or_default(),
                tablets = touched,
                "inserted record"
            );
            inserted.push(record.condense());
        }
        Ok(inserted)
    }

    /// Replace the stored state of keyed records.
    ///
    /// For the root record and every nested record that carries fields, the
    /// stored values of each relation below it become exactly the values
    /// given, which may be none. A trunk named on the root replaces the
    /// record's stored trunk links.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingKey`] if the root, or a nested record with
    /// fields, has no key.
    pub fn update_record(&self, records: &[Record]) -> Result<(), EngineError> {
        let _lock = DatasetLock::acquire(&self.paths)?;

        for record in records {
            let record = self.prepare_mutation(record)?;
            let plans = plan_mutation(&self.schema, &self.paths, record.base())?;
            let edits = update_edits(&record, &plans)?;

            let mut touched = 0;
            for (plan, edit) in plans.iter().zip(&edits) {
                if edit.is_empty() {
                    continue;
                }
                if edit.apply(&plan.tablet, self.write_options())? {
                    touched += 1;
                }
            }
            tracing::info!(
                base = record.base(),
                key = record.key_str().unwrap_or_default(),
                tablets = touched,
                "updated record"
            );
        }
        Ok(())
    }

    /// Delete records, by key or, for keyless records, by query.
    ///
    /// Removes every row of the base's own leaf tablets keyed by a deleted
    /// key and every trunk link pointing at it. Values reachable only through
    /// the deleted record are left in place. Returns the number of keys
    /// deleted.
    pub fn delete_record(&self, records: &[Record]) -> Result<usize, EngineError> {
        let _lock = DatasetLock::acquire(&self.paths)?;
        let mut deleted = 0;

        for record in records {
            let record = self.prepare(record)?;
            let keys: BTreeSet<String> = match record.key() {
                Some(key) => key
                    .items()
                    .filter_map(Value::as_key)
                    .map(str::to_string)
                    .collect(),
                None => self
                    .match_query(&record, &Patterns::new())?
                    .iter()
                    .filter_map(|found| found.key_str().map(str::to_string))
                    .collect(),
            };
            if keys.is_empty() {
                tracing::debug!(base = record.base(), "nothing to delete");
                continue;
            }

            let base = record.base();
            let plans = plan_mutation(&self.schema, &self.paths, base)?;
            for plan in &plans {
                let mut edit = TabletEdit::default();
                if plan.trunk.as_str() == base {
                    for key in &keys {
                        edit.replace.insert(key.clone(), BTreeSet::new());
                    }
                } else if plan.leaf.as_str() == base {
                    edit.drop_second.extend(keys.iter().cloned());
                } else {
                    continue;
                }
                edit.apply(&plan.tablet, self.write_options())?;
            }

            tracing::info!(base, keys = keys.len(), "deleted records");
            deleted += keys.len();
        }
        Ok(deleted)
    }

    /// Append `rows` to `tablet` and sort the result back into place.
    fn append_rows(&self, tablet: &Path, rows: &BTreeSet<Row>) -> Result<(), EngineError> {
        let mut rewrite = TabletRewrite::begin(tablet, self.write_options())?;
        let scratch = rewrite.scratch_path("append.csv");
        let work_dir = rewrite.scratch_dir().to_path_buf();

        let write_err = |source| TabletError::Write {
            path: scratch.clone(),
            source,
        };
        let mut out = BufWriter::new(File::create(&scratch).map_err(write_err)?);
        for row in TabletReader::open(tablet)? {
            let (first, second) = row?;
            writeln!(out, "{}", encode_line(&first, &second)).map_err(write_err)?;
        }
        for (first, second) in rows {
            writeln!(out, "{}", encode_line(first, second)).map_err(write_err)?;
        }
        out.flush().map_err(write_err)?;
        drop(out);

        sort::sort_file(
            &scratch,
            &work_dir,
            self.config.sort_run_lines(),
            |first, second| rewrite.write_row(first, second),
        )?;
        rewrite.commit()?;
        Ok(())
    }
}

/// Give the root, and every nested record with fields, a key if it has none.
fn assign_keys(record: &mut Record, is_root: bool) {
    if record.key().is_none() && (is_root || record.fields().next().is_some()) {
        record.set_key(random_key());
    }
    for (_, value) in record.fields_mut() {
        for item in value.items_mut() {
            if let Value::Nested(nested) = item {
                assign_keys(nested, false);
            }
        }
    }
}

/// Every key in `record` must be one literal, or no row could carry it.
fn check_literal_keys(record: &Record) -> Result<(), EngineError> {
    if record.key().is_some() && record.key_str().is_none() {
        return Err(EngineError::InvalidKey {
            branch: record.base().to_string(),
        });
    }
    for (_, value) in record.fields() {
        for item in value.items() {
            if let Value::Nested(nested) = item {
                check_literal_keys(nested)?;
            }
        }
    }
    Ok(())
}

/// Nested records of `branch` below `record`, excluding `record` itself.
fn nested_nodes<'r>(record: &'r Record, branch: &str, out: &mut Vec<&'r Record>) {
    for (_, value) in record.fields() {
        for item in value.items() {
            if let Value::Nested(nested) = item {
                if nested.base() == branch {
                    out.push(nested);
                }
                nested_nodes(nested, branch, out);
            }
        }
    }
}

/// One edit per plan, describing the full-state replacement of `record`.
fn update_edits(record: &Record, plans: &[Plan]) -> Result<Vec<TabletEdit>, EngineError> {
    let base = record.base();
    let root_key = record
        .key_str()
        .ok_or_else(|| EngineError::MissingKey {
            branch: base.to_string(),
        })?
        .to_string();

    let mut edits = Vec::with_capacity(plans.len());
    for plan in plans {
        let trunk = plan.trunk.as_str();
        let leaf = plan.leaf.as_str();
        let mut edit = TabletEdit::default();

        if leaf == base {
            if let Some(value) = record.get(trunk) {
                edit.drop_second.insert(root_key.clone());
                for item in value.items() {
                    if let Some(trunk_value) = item.as_key() {
                        edit.add.insert((trunk_value.to_string(), root_key.clone()));
                    }
                }
            }
            edits.push(edit);
            continue;
        }

        let mut nodes = Vec::new();
        if trunk == base {
            nodes.push(record);
        }
        nested_nodes(record, trunk, &mut nodes);

        for node in nodes {
            let is_root = std::ptr::eq(node, record);
            if !is_root && node.fields().next().is_none() {
                continue;
            }
            let key = node.key_str().ok_or_else(|| EngineError::MissingKey {
                branch: trunk.to_string(),
            })?;
            let values = edit.replace.entry(key.to_string()).or_default();
            let Some(value) = node.get(leaf) else {
                continue;
            };
            for item in value.items() {
                match item {
                    Value::Nested(nested) if nested.is_bare() => {}
                    _ => {
                        let leaf_value = item.as_key().ok_or_else(|| EngineError::MissingKey {
                            branch: leaf.to_string(),
                        })?;
                        values.insert(leaf_value.to_string());
                    }
                }
            }
        }
        edits.push(edit);
    }
    Ok(edits)
}
