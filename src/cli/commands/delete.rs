//! delete command - Delete records by key or by query

use super::open_dataset;
use crate::cli::args::RecordInput;
use crate::cli::input::read_records;
use crate::cli::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Delete records; keyless records are resolved by query first.
pub fn delete(ctx: &Context, input: &RecordInput) -> Result<()> {
    let dataset = open_dataset(ctx)?;
    let records = read_records(input)?;
    let deleted = dataset.delete_record(&records).context("Delete failed")?;

    output::success(format!("Deleted {deleted} record(s)"), ctx.verbosity());
    Ok(())
}
