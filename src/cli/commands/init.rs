//! init command - Create a dataset

use crate::cli::Context;
use crate::core::config::Config;
use crate::core::types::BranchName;
use crate::engine::Dataset;
use crate::ui::output;
use anyhow::{anyhow, Context as _, Result};

/// Create a dataset in the context's directory.
///
/// # Arguments
///
/// * `ctx` - Execution context
/// * `pairs` - Schema relations as `trunk:leaf`
pub fn init(ctx: &Context, pairs: &[String]) -> Result<()> {
    let dir = ctx.dataset_dir()?;
    let pairs = pairs
        .iter()
        .map(|pair| parse_pair(pair))
        .collect::<Result<Vec<_>>>()?;

    let config = Config::load(Some(&dir))
        .context("Failed to load configuration")?
        .config;
    let dataset = Dataset::init(&dir, &pairs, config)
        .with_context(|| format!("Failed to initialize dataset at {}", dir.display()))?;

    output::success(
        format!(
            "Initialized dataset at {} with {} relation(s)",
            dataset.paths().root().display(),
            pairs.len()
        ),
        ctx.verbosity(),
    );
    Ok(())
}

/// Parse one `trunk:leaf` pair.
fn parse_pair(pair: &str) -> Result<(BranchName, BranchName)> {
    let (trunk, leaf) = pair
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid schema pair '{pair}': expected trunk:leaf"))?;
    let trunk = BranchName::new(trunk.trim())
        .with_context(|| format!("Invalid trunk in schema pair '{pair}'"))?;
    let leaf = BranchName::new(leaf.trim())
        .with_context(|| format!("Invalid leaf in schema pair '{pair}'"))?;
    Ok((trunk, leaf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs() {
        let (trunk, leaf) = parse_pair("datum:actname").unwrap();
        assert_eq!(trunk.as_str(), "datum");
        assert_eq!(leaf.as_str(), "actname");
        assert!(parse_pair("datum").is_err());
        assert!(parse_pair("datum:").is_err());
        assert!(parse_pair("da-tum:x").is_err());
    }
}
