//! engine::select
//!
//! Read operations: record selection, option enumeration, and hydration.
//!
//! Selection runs in two stages. The query stage chains the filtering plans
//! and yields partial records carrying the matched key and the matched
//! values; these are merged by key. The value stage then runs the hydration
//! plans over each merged record, skipping relations the query stage already
//! bound.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use super::matcher::{chain, Patterns, Scan};
use super::plan::{plan_options, plan_query, plan_values, Plan};
use super::{Dataset, EngineError};
use crate::core::grain::mow;
use crate::core::record::Record;

impl Dataset {
    /// Find every record matching `query`, fully hydrated.
    ///
    /// Results are ordered by key.
    pub fn select_record(&self, query: &Record) -> Result<Vec<Record>, EngineError> {
        let query = self.prepare(query)?;
        let patterns = Patterns::new();

        let matched = self.match_query(&query, &patterns)?;
        let values = plan_values(&self.schema, &self.paths, query.base())?;

        let mut results = Vec::with_capacity(matched.len());
        for record in matched {
            results.push(self.hydrate(record, &values, &patterns)?.condense());
        }
        tracing::debug!(base = query.base(), results = results.len(), "selected records");
        Ok(results)
    }

    /// Enumerate the distinct values of the query's base branch.
    ///
    /// With constraints, returns the keys of matching records as bare
    /// `{_: base, base: key}` records. Without, returns every value that
    /// appears in any tablet touching the base, each once.
    pub fn select_option(&self, query: &Record) -> Result<Vec<Record>, EngineError> {
        let query = self.prepare(query)?;
        let patterns = Patterns::new();
        let plans = plan_query(&self.schema, &self.paths, &query)?;

        let options = if plans.is_empty() {
            self.enumerate_options(&query, &patterns)?
        } else {
            let mut seen = HashSet::new();
            let mut options = Vec::new();
            for record in chain(&plans, &patterns, query.clone()) {
                let record = record?;
                let Some(key) = record.key_str() else {
                    continue;
                };
                if seen.insert(key.to_string()) {
                    options.push(Record::new(query.base()).with_key(key));
                }
            }
            options
        };

        tracing::debug!(base = query.base(), options = options.len(), "selected options");
        Ok(options.iter().map(Record::condense).collect())
    }

    /// Hydrate caller-supplied records without filtering.
    ///
    /// Each keyed record gains every stored value in its crown; keyless
    /// records are returned as given.
    pub fn build_record(&self, records: &[Record]) -> Result<Vec<Record>, EngineError> {
        let patterns = Patterns::new();
        let mut built = Vec::with_capacity(records.len());

        for record in records {
            let record = self.prepare(record)?;
            if record.key_str().is_none() {
                built.push(record.condense());
                continue;
            }
            let values = plan_values(&self.schema, &self.paths, record.base())?;
            built.push(self.hydrate(record, &values, &patterns)?.condense());
        }
        Ok(built)
    }

    /// Run the query stage of `query` (expanded) and merge results by key.
    pub(crate) fn match_query(
        &self,
        query: &Record,
        patterns: &Patterns,
    ) -> Result<Vec<Record>, EngineError> {
        let plans = plan_query(&self.schema, &self.paths, query)?;
        let found = if plans.is_empty() {
            self.enumerate_options(query, patterns)?
        } else {
            chain(&plans, patterns, query.clone()).collect::<Result<Vec<_>, _>>()?
        };

        let mut merged: BTreeMap<String, Record> = BTreeMap::new();
        for record in found {
            let Some(key) = record.key_str().map(str::to_string) else {
                tracing::debug!(record = %record, "dropping keyless match");
                continue;
            };
            match merged.entry(key) {
                Entry::Occupied(mut entry) => entry.get_mut().merge(record),
                Entry::Vacant(entry) => {
                    entry.insert(record);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    /// Every distinct value of the query's base, in first-seen order.
    fn enumerate_options(
        &self,
        query: &Record,
        patterns: &Patterns,
    ) -> Result<Vec<Record>, EngineError> {
        let mut seed = Record::new(query.base());
        if let Some(key) = query.key() {
            seed.insert(query.base(), key.clone());
        }

        let plans = plan_options(&self.schema, &self.paths, query.base())?;
        let mut seen = HashSet::new();
        let mut options = Vec::new();
        for plan in &plans {
            for record in Scan::open(plan, patterns, seed.clone(), true)? {
                let record = record?;
                if seen.insert(record.clone()) {
                    options.push(record);
                }
            }
        }
        Ok(options)
    }

    /// Run the value stage over one keyed record.
    fn hydrate(
        &self,
        record: Record,
        plans: &[Plan],
        patterns: &Patterns,
    ) -> Result<Record, EngineError> {
        if record.key_str().is_none() {
            return Ok(record);
        }

        // relations bound by the query stage keep their matched values
        let bound: Vec<bool> = plans
            .iter()
            .map(|plan| !mow(&record, plan.trunk.as_str(), plan.leaf.as_str()).is_empty())
            .collect();

        let mut acc = record;
        for (plan, bound) in plans.iter().zip(bound) {
            if bound {
                tracing::trace!(plan = %plan, "relation already bound");
                continue;
            }
            let mut hydrated: Option<Record> = None;
            for record in Scan::open(plan, patterns, acc.clone(), false)? {
                let record = record?;
                match hydrated.as_mut() {
                    Some(existing) => existing.merge(record),
                    None => hydrated = Some(record),
                }
            }
            if let Some(hydrated) = hydrated {
                acc = hydrated;
            }
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::types::BranchName;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn dataset(pairs: &[(&str, &str)], tablets: &[(&str, &str)]) -> (TempDir, Dataset) {
        let temp = TempDir::new().unwrap();
        let pairs: Vec<_> = pairs
            .iter()
            .map(|(t, l)| (BranchName::new(*t).unwrap(), BranchName::new(*l).unwrap()))
            .collect();
        let ds = Dataset::init(temp.path(), &pairs, Config::default()).unwrap();
        for (name, contents) in tablets {
            fs::write(temp.path().join(name), contents).unwrap();
        }
        (temp, ds)
    }

    fn acts() -> (TempDir, Dataset) {
        dataset(
            &[("datum", "actname"), ("datum", "actdate")],
            &[
                ("datum-actname.csv", "k1,name1\nk2,name2\nk3,name3\n"),
                ("datum-actdate.csv", "k1,2001\nk2,2002\nk3,2003\n"),
            ],
        )
    }

    fn q(value: serde_json::Value) -> Record {
        Record::from_json(&value).unwrap()
    }

    fn json(records: Vec<Record>) -> Vec<serde_json::Value> {
        records.iter().map(Record::to_json).collect()
    }

    #[test]
    fn select_by_exact_value_hydrates_siblings() {
        let (_temp, ds) = acts();
        let found = ds
            .select_record(&q(json!({"_": "datum", "actname": "name2"})))
            .unwrap();
        assert_eq!(
            json(found),
            vec![json!({"_": "datum", "datum": "k2", "actname": "name2", "actdate": "2002"})]
        );
    }

    #[test]
    fn select_by_regex_returns_key_order() {
        let (_temp, ds) = acts();
        let found = ds
            .select_record(&q(json!({"_": "datum", "actname": "name[13]"})))
            .unwrap();
        let keys: Vec<_> = found.iter().map(|r| r.key_str().unwrap().to_string()).collect();
        assert_eq!(keys, vec!["k1", "k3"]);
    }

    #[test]
    fn select_intersects_constraints() {
        let (_temp, ds) = acts();
        let found = ds
            .select_record(&q(json!({"_": "datum", "actname": "name.*", "actdate": "2003"})))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key_str(), Some("k3"));
    }

    #[test]
    fn select_without_constraints_returns_everything() {
        let (_temp, ds) = acts();
        let found = ds.select_record(&q(json!({"_": "datum"}))).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(
            found[0].to_json(),
            json!({"_": "datum", "datum": "k1", "actname": "name1", "actdate": "2001"})
        );
    }

    #[test]
    fn select_by_key_hydrates_that_record() {
        let (_temp, ds) = acts();
        let found = ds.select_record(&q(json!({"_": "datum", "datum": "k3"}))).unwrap();
        assert_eq!(
            json(found),
            vec![json!({"_": "datum", "datum": "k3", "actname": "name3", "actdate": "2003"})]
        );
    }

    #[test]
    fn select_with_no_match_is_empty() {
        let (_temp, ds) = acts();
        let found = ds
            .select_record(&q(json!({"_": "datum", "actname": "nobody"})))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn select_on_empty_dataset_is_empty() {
        let (_temp, ds) = dataset(&[("datum", "actname")], &[]);
        assert!(ds.select_record(&q(json!({"_": "datum"}))).unwrap().is_empty());
        assert!(ds
            .select_record(&q(json!({"_": "datum", "actname": ".*"})))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn select_rejects_unknown_branch() {
        let (_temp, ds) = acts();
        let err = ds
            .select_record(&q(json!({"_": "datum", "unknown": "x"})))
            .unwrap_err();
        assert!(matches!(err, EngineError::Plan(_)));
    }

    #[test]
    fn options_list_distinct_values_in_first_seen_order() {
        let (_temp, ds) = dataset(
            &[("datum", "actname")],
            &[("datum-actname.csv", "k1,shared\nk2,shared\nk3,other\n")],
        );
        let options = ds.select_option(&q(json!({"_": "actname"}))).unwrap();
        assert_eq!(
            json(options),
            vec![
                json!({"_": "actname", "actname": "shared"}),
                json!({"_": "actname", "actname": "other"}),
            ]
        );
    }

    #[test]
    fn options_with_constraints_project_keys() {
        let (_temp, ds) = acts();
        let options = ds
            .select_option(&q(json!({"_": "datum", "actname": "name[12]"})))
            .unwrap();
        assert_eq!(
            json(options),
            vec![
                json!({"_": "datum", "datum": "k1"}),
                json!({"_": "datum", "datum": "k2"}),
            ]
        );
    }

    #[test]
    fn nested_trunk_and_leaf_values_hydrate() {
        let (_temp, ds) = dataset(
            &[("datum", "filepath"), ("filepath", "moddate")],
            &[
                ("datum-filepath.csv", "k1,/a\nk1,/b\nk2,/c\n"),
                ("filepath-moddate.csv", "/a,m1\n/c,m3\n"),
            ],
        );
        let found = ds
            .select_record(&q(json!({"_": "datum", "filepath": {"moddate": "m1"}})))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key_str(), Some("k1"));

        let built = ds.build_record(&[q(json!({"_": "datum", "datum": "k2"}))]).unwrap();
        assert_eq!(
            json(built),
            vec![json!({
                "_": "datum",
                "datum": "k2",
                "filepath": {"_": "filepath", "filepath": "/c", "moddate": "m3"}
            })]
        );
    }

    #[test]
    fn trunk_constraint_selects_leaves() {
        let (_temp, ds) = dataset(
            &[("datum", "filepath")],
            &[("datum-filepath.csv", "k1,/a\nk2,/b\n")],
        );
        let found = ds
            .select_record(&q(json!({"_": "filepath", "datum": "k2"})))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key_str(), Some("/b"));
    }

    #[test]
    fn build_leaves_keyless_records_alone() {
        let (_temp, ds) = acts();
        let built = ds
            .build_record(&[q(json!({"_": "datum", "actname": "draft"}))])
            .unwrap();
        assert_eq!(json(built), vec![json!({"_": "datum", "actname": "draft"})]);
    }
}
