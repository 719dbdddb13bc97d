//! schema command - Print the dataset schema

use super::open_dataset;
use crate::cli::Context;
use crate::ui::output;
use anyhow::Result;

/// Print every `trunk:leaf` relation, one per line.
pub fn schema(ctx: &Context) -> Result<()> {
    let dataset = open_dataset(ctx)?;
    let pairs = dataset.schema().to_pairs();
    println!("{}", output::format_pairs(&pairs));
    Ok(())
}
