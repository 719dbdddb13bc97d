//! core::record
//!
//! The in-memory nested entity tree.
//!
//! # Shape
//!
//! A record is `{ "_": base, base: key, leaf: value, ... }`. Field values are
//! one of three explicit shapes, see [`Value`]:
//!
//! - a literal string
//! - a list of values
//! - a nested record of the field's branch
//!
//! # Terse and expanded forms
//!
//! Callers use the terse shape, where a field with nothing below it is a bare
//! literal (`"actname": "name1"`). The matcher always works on the expanded
//! shape, where every field value is a nested record
//! (`"actname": {"_": "actname", "actname": "name1"}`). [`Record::expand`] and
//! [`Record::condense`] convert between the two losslessly.
//!
//! # Example
//!
//! ```
//! use arbordb::core::record::Record;
//! use serde_json::json;
//!
//! let terse = Record::from_json(&json!({"_": "datum", "datum": "k1", "actname": "name1"})).unwrap();
//! let expanded = terse.expand();
//! assert_eq!(
//!     expanded.to_json(),
//!     json!({"_": "datum", "datum": "k1", "actname": {"_": "actname", "actname": "name1"}})
//! );
//! assert_eq!(expanded.condense(), terse);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json};
use thiserror::Error;

/// JSON key holding the base branch name.
pub const BASE_KEY: &str = "_";

/// Errors from record construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record must be a JSON object")]
    NotAnObject,

    #[error("record is missing its '_' base branch")]
    MissingBase,

    #[error("field '{field}' holds a record of branch '{found}'")]
    BaseMismatch { field: String, found: String },

    #[error("field '{0}' holds a list inside a list")]
    NestedList(String),
}

/// A record field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Literal(String),
    List(Vec<Value>),
    Nested(Record),
}

impl Value {
    /// Iterate the items of this value; a non-list value is one item.
    pub fn items(&self) -> std::slice::Iter<'_, Value> {
        match self {
            Value::List(items) => items.iter(),
            single => std::slice::from_ref(single).iter(),
        }
    }

    /// Mutably iterate the items of this value.
    pub fn items_mut(&mut self) -> std::slice::IterMut<'_, Value> {
        match self {
            Value::List(items) => items.iter_mut(),
            single => std::slice::from_mut(single).iter_mut(),
        }
    }

    /// Consume this value into its items.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            single => vec![single],
        }
    }

    /// Build a value from items: one item stays single, several become a list.
    pub fn from_items(mut items: Vec<Value>) -> Option<Value> {
        match items.len() {
            0 => None,
            1 => items.pop(),
            _ => Some(Value::List(items)),
        }
    }

    /// The literal string of this value, or the key of a nested record.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Value::Literal(s) => Some(s),
            Value::Nested(record) => record.key_str(),
            Value::List(_) => None,
        }
    }

    /// Merge `other` into this value.
    ///
    /// Nested records sharing a key merge recursively, equal items are kept
    /// once, and a single value is promoted to a list on the second distinct
    /// value.
    pub fn merge(self, other: Value) -> Value {
        let mut items = self.into_items();
        for item in other.into_items() {
            merge_item(&mut items, item);
        }
        Value::from_items(items).unwrap_or(Value::List(Vec::new()))
    }

    fn to_json(&self) -> Json {
        match self {
            Value::Literal(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Nested(record) => record.to_json(),
        }
    }
}

fn merge_item(items: &mut Vec<Value>, item: Value) {
    if let Value::Nested(incoming) = &item {
        if let Some(key) = incoming.key_str() {
            let existing = items.iter_mut().find_map(|v| match v {
                Value::Nested(r) if r.base == incoming.base && r.key_str() == Some(key) => Some(r),
                _ => None,
            });
            if let Some(existing) = existing {
                if let Value::Nested(incoming) = item {
                    existing.merge(incoming);
                }
                return;
            }
        }
    }
    if !items.contains(&item) {
        items.push(item);
    }
}

/// A nested entity record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    base: String,
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create a record of `base` with no key and no fields.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder: set the record's own key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.set_key(key);
        self
    }

    /// Builder: set a field.
    pub fn with_field(mut self, branch: impl Into<String>, value: Value) -> Self {
        self.fields.insert(branch.into(), value);
        self
    }

    /// The base branch name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The record's own value (its key), in whatever shape it was given.
    pub fn key(&self) -> Option<&Value> {
        self.fields.get(&self.base)
    }

    /// The record's key when it is a single literal.
    pub fn key_str(&self) -> Option<&str> {
        match self.key() {
            Some(Value::Literal(s)) => Some(s),
            _ => None,
        }
    }

    /// Bind the record's own key.
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.fields
            .insert(self.base.clone(), Value::Literal(key.into()));
    }

    /// Get a field by branch name. The base branch yields the key.
    pub fn get(&self, branch: &str) -> Option<&Value> {
        self.fields.get(branch)
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, branch: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(branch.into(), value)
    }

    /// Merge a value into a field, promoting to a list on a second distinct value.
    pub fn append(&mut self, branch: &str, value: Value) {
        let merged = match self.fields.remove(branch) {
            Some(existing) => existing.merge(value),
            None => value,
        };
        self.fields.insert(branch.to_string(), merged);
    }

    /// Fields other than the key, in branch name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .filter(move |(k, _)| **k != self.base)
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Mutable access to fields other than the key.
    pub fn fields_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        let base = self.base.clone();
        self.fields
            .iter_mut()
            .filter(move |(k, _)| **k != base)
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Whether the record has neither a key nor any field.
    pub fn is_bare(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge another record of the same base into this one.
    ///
    /// Keys and fields merge with [`Value::merge`] semantics.
    pub fn merge(&mut self, other: Record) {
        debug_assert_eq!(self.base, other.base);
        for (branch, value) in other.fields {
            self.append(&branch, value);
        }
    }

    /// Convert to the expanded shape: every field value becomes a nested record.
    pub fn expand(&self) -> Record {
        let fields = self
            .fields
            .iter()
            .map(|(branch, value)| {
                let value = if *branch == self.base {
                    value.clone()
                } else {
                    expand_value(branch, value)
                };
                (branch.clone(), value)
            })
            .collect();
        Record {
            base: self.base.clone(),
            fields,
        }
    }

    /// Convert to the terse shape: nested records holding only a literal key
    /// become bare literals.
    pub fn condense(&self) -> Record {
        let fields = self
            .fields
            .iter()
            .map(|(branch, value)| {
                let value = if *branch == self.base {
                    value.clone()
                } else {
                    condense_value(value)
                };
                (branch.clone(), value)
            })
            .collect();
        Record {
            base: self.base.clone(),
            fields,
        }
    }

    /// Parse a record from JSON.
    ///
    /// Numbers and booleans become literals, `null` fields are dropped. A
    /// nested object may omit `_`, in which case the field name is its base.
    pub fn from_json(json: &Json) -> Result<Record, RecordError> {
        let object = json.as_object().ok_or(RecordError::NotAnObject)?;
        let base = match object.get(BASE_KEY) {
            Some(Json::String(base)) => base.clone(),
            _ => return Err(RecordError::MissingBase),
        };
        Self::from_object(base, object)
    }

    fn from_object(base: String, object: &Map<String, Json>) -> Result<Record, RecordError> {
        let mut record = Record::new(base);
        for (branch, json) in object {
            if branch == BASE_KEY {
                continue;
            }
            if let Some(value) = value_from_json(branch, json, false)? {
                record.fields.insert(branch.clone(), value);
            }
        }
        Ok(record)
    }

    /// Render as JSON.
    pub fn to_json(&self) -> Json {
        let mut object = Map::new();
        object.insert(BASE_KEY.to_string(), Json::String(self.base.clone()));
        if let Some(key) = self.key() {
            object.insert(self.base.clone(), key.to_json());
        }
        for (branch, value) in self.fields() {
            object.insert(branch.to_string(), value.to_json());
        }
        Json::Object(object)
    }
}

fn value_from_json(branch: &str, json: &Json, in_list: bool) -> Result<Option<Value>, RecordError> {
    let value = match json {
        Json::Null => return Ok(None),
        Json::String(s) => Value::Literal(s.clone()),
        Json::Number(n) => Value::Literal(n.to_string()),
        Json::Bool(b) => Value::Literal(b.to_string()),
        Json::Array(items) => {
            if in_list {
                return Err(RecordError::NestedList(branch.to_string()));
            }
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                if let Some(value) = value_from_json(branch, item, true)? {
                    values.push(value);
                }
            }
            Value::List(values)
        }
        Json::Object(object) => {
            let base = match object.get(BASE_KEY) {
                Some(Json::String(found)) if found != branch => {
                    return Err(RecordError::BaseMismatch {
                        field: branch.to_string(),
                        found: found.clone(),
                    })
                }
                _ => branch.to_string(),
            };
            Value::Nested(Record::from_object(base, object)?)
        }
    };
    Ok(Some(value))
}

fn expand_value(branch: &str, value: &Value) -> Value {
    match value {
        Value::Literal(s) => Value::Nested(Record::new(branch).with_key(s.clone())),
        Value::List(items) => Value::List(items.iter().map(|v| expand_value(branch, v)).collect()),
        Value::Nested(record) => Value::Nested(record.expand()),
    }
}

fn condense_value(value: &Value) -> Value {
    match value {
        Value::Literal(s) => Value::Literal(s.clone()),
        Value::List(items) => Value::List(items.iter().map(condense_value).collect()),
        Value::Nested(record) => {
            let record = record.condense();
            match (record.fields.len(), record.key_str()) {
                (1, Some(key)) => Value::Literal(key.to_string()),
                _ => Value::Nested(record),
            }
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Record::from_json(&json).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
