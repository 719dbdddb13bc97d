//! update command - Replace the stored state of keyed records

use super::open_dataset;
use crate::cli::args::RecordInput;
use crate::cli::input::read_records;
use crate::cli::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

pub fn update(ctx: &Context, input: &RecordInput) -> Result<()> {
    let dataset = open_dataset(ctx)?;
    let records = read_records(input)?;
    dataset.update_record(&records).context("Update failed")?;

    output::success(format!("Updated {} record(s)", records.len()), ctx.verbosity());
    Ok(())
}
