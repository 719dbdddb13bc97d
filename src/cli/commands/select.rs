//! select command - Select records matching a query

use super::open_dataset;
use crate::cli::args::RecordInput;
use crate::cli::input::read_query;
use crate::cli::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Print every record matching the query as a JSON array.
pub fn select(ctx: &Context, input: &RecordInput) -> Result<()> {
    let dataset = open_dataset(ctx)?;
    let query = read_query(input)?;
    let records = dataset.select_record(&query).context("Select failed")?;
    output::json(&records, dataset.config().pretty())?;
    Ok(())
}
