//! core::grain
//!
//! Grains are the minimal matched fragments of a record: one tablet line seen
//! as `{ _: base, trait: value, thing: value }`.
//!
//! - [`mow`] extracts the grains already present in a record, e.g. the
//!   relations a caller-supplied record asks to persist.
//! - [`sow`] merges one grain back into a record's tree at the correct depth.
//!
//! Both operate on expanded records (see [`Record::expand`]).

use super::record::{Record, Value};

/// One `(trait, thing)` fragment from a single tablet line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Grain {
    /// Branch the grain is rooted at; one of `trait_branch` / `thing_branch`.
    pub base: String,
    pub trait_branch: String,
    pub trait_value: String,
    pub thing_branch: String,
    pub thing_value: String,
}

impl Grain {
    /// A grain rooted at its trait, e.g. a trunk key and one leaf value.
    pub fn new(
        trait_branch: impl Into<String>,
        trait_value: impl Into<String>,
        thing_branch: impl Into<String>,
        thing_value: impl Into<String>,
    ) -> Self {
        let trait_branch = trait_branch.into();
        Self {
            base: trait_branch.clone(),
            trait_branch,
            trait_value: trait_value.into(),
            thing_branch: thing_branch.into(),
            thing_value: thing_value.into(),
        }
    }
}

/// Extract every `(trait, thing)` grain present in an expanded record.
///
/// A grain is produced wherever a keyed node of branch `trait_branch` holds
/// keyed `thing_branch` values, and wherever a keyed node of `thing_branch`
/// names its `trait_branch` value (a trunk given inline). Grains are returned
/// in tree order without duplicates.
pub fn mow(record: &Record, trait_branch: &str, thing_branch: &str) -> Vec<Grain> {
    let mut grains = Vec::new();
    mow_into(record, trait_branch, thing_branch, &mut grains);
    grains
}

fn mow_into(record: &Record, trait_branch: &str, thing_branch: &str, grains: &mut Vec<Grain>) {
    let key = record.key_str();

    if let (true, Some(key)) = (record.base() == trait_branch, key) {
        if let Some(value) = record.get(thing_branch) {
            for item in value.items() {
                if let Some(thing) = item.as_key() {
                    push_unique(grains, Grain::new(trait_branch, key, thing_branch, thing));
                }
            }
        }
    }

    if let (true, Some(key)) = (record.base() == thing_branch, key) {
        if let Some(value) = record.get(trait_branch) {
            for item in value.items() {
                if let Some(trunk) = item.as_key() {
                    let mut grain = Grain::new(trait_branch, trunk, thing_branch, key);
                    grain.base = thing_branch.to_string();
                    push_unique(grains, grain);
                }
            }
        }
    }

    for (_, value) in record.fields() {
        for item in value.items() {
            if let Value::Nested(nested) = item {
                mow_into(nested, trait_branch, thing_branch, grains);
            }
        }
    }
}

fn push_unique(grains: &mut Vec<Grain>, grain: Grain) {
    if !grains.contains(&grain) {
        grains.push(grain);
    }
}

/// Merge one grain into an expanded record.
///
/// The thing value is added under every node of the grain's trait branch
/// whose key equals the trait value, creating the nested sub-record and
/// promoting an existing single value to a list. If the record itself is the
/// grain's thing, the trait value is attached as its trunk instead.
///
/// Returns whether the grain found a place in the record.
pub fn sow(record: &mut Record, grain: &Grain) -> bool {
    let mut placed = false;

    if record.base() == grain.trait_branch && record.key_str() == Some(grain.trait_value.as_str()) {
        record.append(
            &grain.thing_branch,
            Value::Nested(Record::new(&grain.thing_branch).with_key(&grain.thing_value)),
        );
        placed = true;
    } else if grain.base == grain.thing_branch
        && record.base() == grain.thing_branch
        && record.key_str() == Some(grain.thing_value.as_str())
    {
        record.append(
            &grain.trait_branch,
            Value::Nested(Record::new(&grain.trait_branch).with_key(&grain.trait_value)),
        );
        return true;
    }

    for (branch, value) in record.fields_mut() {
        if branch == grain.thing_branch && placed {
            continue;
        }
        placed |= sow_value(value, grain);
    }
    placed
}

fn sow_value(value: &mut Value, grain: &Grain) -> bool {
    match value {
        Value::Nested(nested) => sow(nested, grain),
        Value::List(items) => {
            let mut placed = false;
            for item in items.iter_mut() {
                placed |= sow_value(item, grain);
            }
            placed
        }
        Value::Literal(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expanded(json: serde_json::Value) -> Record {
        Record::from_json(&json).unwrap().expand()
    }

    #[test]
    fn mow_extracts_direct_leaves() {
        let r = expanded(json!({"_": "datum", "datum": "k1", "actname": ["a", "b"]}));
        let grains = mow(&r, "datum", "actname");
        assert_eq!(
            grains,
            vec![
                Grain::new("datum", "k1", "actname", "a"),
                Grain::new("datum", "k1", "actname", "b"),
            ]
        );
    }

    #[test]
    fn mow_finds_nested_relations() {
        let r = expanded(json!({
            "_": "datum",
            "datum": "k1",
            "filepath": [
                {"filepath": "f1", "moddate": "m1"},
                {"filepath": "f2", "moddate": "m2"}
            ]
        }));
        let grains = mow(&r, "filepath", "moddate");
        assert_eq!(grains.len(), 2);
        assert_eq!(grains[1], Grain::new("filepath", "f2", "moddate", "m2"));
    }

    #[test]
    fn mow_reads_inline_trunk() {
        let r = expanded(json!({"_": "filepath", "filepath": "f1", "datum": "k1"}));
        let grains = mow(&r, "datum", "filepath");
        assert_eq!(grains.len(), 1);
        assert_eq!(grains[0].base, "filepath");
        assert_eq!(grains[0].trait_value, "k1");
        assert_eq!(grains[0].thing_value, "f1");
    }

    #[test]
    fn mow_skips_unkeyed_nodes() {
        let r = expanded(json!({"_": "datum", "actname": "a"}));
        assert!(mow(&r, "datum", "actname").is_empty());
    }

    #[test]
    fn sow_places_grain_at_depth_and_promotes_lists() {
        let mut r = expanded(json!({"_": "datum", "datum": "k1", "filepath": ["f1", "f2"]}));
        assert!(sow(&mut r, &Grain::new("filepath", "f2", "moddate", "m")));
        assert!(sow(&mut r, &Grain::new("datum", "k1", "actname", "a")));
        assert!(sow(&mut r, &Grain::new("datum", "k1", "actname", "b")));
        assert!(!sow(&mut r, &Grain::new("filepath", "zz", "moddate", "m")));
        assert_eq!(
            r.condense().to_json(),
            json!({
                "_": "datum",
                "datum": "k1",
                "actname": ["a", "b"],
                "filepath": ["f1", {"_": "filepath", "filepath": "f2", "moddate": "m"}]
            })
        );
    }

    #[test]
    fn sow_then_mow_recovers_grain() {
        let grain = Grain::new("datum", "k1", "actdate", "2001-01-01");
        let mut r = Record::new("datum").with_key("k1");
        assert!(sow(&mut r, &grain));
        assert_eq!(mow(&r, "datum", "actdate"), vec![grain]);
    }
}
