//! cli::args
//!
//! The `arbor` command line, declared with clap derive.
//!
//! `--dir`, `--debug` and `--quiet` are global and may follow the
//! subcommand. Record-taking commands read JSON from `--query`, or from
//! stdin when it is absent.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Arbor - a schema-driven flat-file tree database
#[derive(Parser, Debug)]
#[command(name = "arbor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Dataset directory (default: current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Records given on the command line or on stdin.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RecordInput {
    /// JSON record or array of records (default: read from stdin)
    #[arg(long, value_name = "JSON")]
    pub query: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a dataset with the given schema
    #[command(
        name = "init",
        long_about = "Create a dataset in the dataset directory.\n\n\
            The schema is a set of trunk:leaf pairs. Every pair becomes a row of \
            the schema tablet, and each relation is later stored in its own tablet \
            named <trunk>-<leaf>.csv. The pairs must form a DAG.",
        after_help = "\
WORKFLOW EXAMPLES:
    # A datum with a name and a date
    arbor init --schema datum:actname --schema datum:actdate

    # Nested branches: files belong to a datum and carry a modification date
    arbor --dir notes init -s datum:filepath -s filepath:moddate"
    )]
    Init {
        /// Trunk/leaf pair, as `trunk:leaf`
        #[arg(short = 's', long = "schema", value_name = "TRUNK:LEAF", required = true)]
        pairs: Vec<String>,
    },

    /// Print the dataset schema
    #[command(name = "schema")]
    Schema,

    /// Select records matching a query
    #[command(
        name = "select",
        long_about = "Select every record matching a query, fully hydrated.\n\n\
            A query is a record: `_` names the base branch and every other field \
            constrains a related branch. Values are regular expressions matched \
            against whole stored values; a list of values matches any of them.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Exact value
    arbor select --query '{\"_\": \"datum\", \"actname\": \"name1\"}'

    # Pattern, combined with a second constraint
    arbor select --query '{\"_\": \"datum\", \"actname\": \"name.*\", \"actdate\": \".*-01-01\"}'

    # Everything of a branch
    echo '{\"_\": \"datum\"}' | arbor select"
    )]
    Select {
        #[command(flatten)]
        input: RecordInput,
    },

    /// List the distinct values of a branch
    #[command(
        name = "options",
        after_help = "\
WORKFLOW EXAMPLES:
    # Every name ever recorded
    arbor options --query '{\"_\": \"actname\"}'"
    )]
    Options {
        #[command(flatten)]
        input: RecordInput,
    },

    /// Hydrate records from their keys
    #[command(name = "build")]
    Build {
        #[command(flatten)]
        input: RecordInput,
    },

    /// Insert records, assigning keys where missing
    #[command(
        name = "insert",
        after_help = "\
WORKFLOW EXAMPLES:
    # Insert with a generated key; the stored record is printed
    arbor insert --query '{\"_\": \"datum\", \"actname\": \"name4\", \"actdate\": \"2004-01-01\"}'"
    )]
    Insert {
        #[command(flatten)]
        input: RecordInput,
    },

    /// Replace the stored state of keyed records
    #[command(
        name = "update",
        long_about = "Replace the stored state of keyed records.\n\n\
            The record given is the full new state: relations below it that the \
            record leaves out are removed. The record must carry its key."
    )]
    Update {
        #[command(flatten)]
        input: RecordInput,
    },

    /// Delete records by key or by query
    #[command(name = "delete")]
    Delete {
        #[command(flatten)]
        input: RecordInput,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash
    arbor completion bash > ~/.local/share/bash-completion/completions/arbor

    # Zsh
    arbor completion zsh > \"${fpath[1]}/_arbor\""
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["arbor", "select", "--dir", "/tmp/x", "-q"]).unwrap();
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/x")));
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Select { .. }));
    }

    #[test]
    fn init_requires_schema_pairs() {
        assert!(Cli::try_parse_from(["arbor", "init"]).is_err());
        let cli = Cli::try_parse_from(["arbor", "init", "-s", "a:b", "-s", "a:c"]).unwrap();
        match cli.command {
            Command::Init { pairs } => assert_eq!(pairs, vec!["a:b", "a:c"]),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
