//! cli::input
//!
//! JSON record input from `--query` or stdin.

use std::io::Read;

use anyhow::{bail, Context as _, Result};
use serde_json::Value as Json;

use super::args::RecordInput;
use crate::core::record::Record;

/// Read the raw JSON text: `--query` when given, else all of stdin.
fn read_text(input: &RecordInput) -> Result<String> {
    if let Some(query) = &input.query {
        return Ok(query.clone());
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read records from stdin")?;
    Ok(text)
}

/// Parse one record or an array of records.
pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    let json: Json = serde_json::from_str(text.trim()).context("Input is not valid JSON")?;
    match json {
        Json::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                Record::from_json(item).with_context(|| format!("Invalid record at index {i}"))
            })
            .collect(),
        other => Ok(vec![Record::from_json(&other).context("Invalid record")?]),
    }
}

/// Parse exactly one record.
pub fn parse_query(text: &str) -> Result<Record> {
    let mut records = parse_records(text)?;
    if records.len() != 1 {
        bail!("Expected a single query record, got {}", records.len());
    }
    Ok(records.remove(0))
}

/// Read records for a mutation or build.
pub fn read_records(input: &RecordInput) -> Result<Vec<Record>> {
    parse_records(&read_text(input)?)
}

/// Read a single query record.
pub fn read_query(input: &RecordInput) -> Result<Record> {
    parse_query(&read_text(input)?)
}
