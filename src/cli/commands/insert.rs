//! insert command - Insert records

use super::open_dataset;
use crate::cli::args::RecordInput;
use crate::cli::input::read_records;
use crate::cli::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Insert records and print them as stored, keys included.
pub fn insert(ctx: &Context, input: &RecordInput) -> Result<()> {
    let dataset = open_dataset(ctx)?;
    let records = read_records(input)?;
    let inserted = dataset.insert_record(&records).context("Insert failed")?;

    output::success(format!("Inserted {} record(s)", inserted.len()), ctx.verbosity());
    output::json(&inserted, dataset.config().pretty())?;
    Ok(())
}
