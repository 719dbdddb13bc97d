//! build command - Hydrate records from their keys

use super::open_dataset;
use crate::cli::args::RecordInput;
use crate::cli::input::read_records;
use crate::cli::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

pub fn build(ctx: &Context, input: &RecordInput) -> Result<()> {
    let dataset = open_dataset(ctx)?;
    let records = read_records(input)?;
    let built = dataset.build_record(&records).context("Build failed")?;
    output::json(&built, dataset.config().pretty())?;
    Ok(())
}
