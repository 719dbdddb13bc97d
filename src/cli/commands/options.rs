//! options command - List the distinct values of a branch

use super::open_dataset;
use crate::cli::args::RecordInput;
use crate::cli::input::read_query;
use crate::cli::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

pub fn options(ctx: &Context, input: &RecordInput) -> Result<()> {
    let dataset = open_dataset(ctx)?;
    let query = read_query(input)?;
    let options = dataset.select_option(&query).context("Option listing failed")?;
    output::json(&options, dataset.config().pretty())?;
    Ok(())
}
