//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Reads and validates its input records
//! 2. Calls the engine to execute the command
//! 3. Formats and displays output
//!
//! Handlers do NOT touch tablets directly.

mod build;
mod completion;
mod delete;
mod init;
mod insert;
mod options;
mod schema_cmd;
mod select;
mod update;

// Re-export command functions for testing and direct invocation
pub use build::build;
pub use completion::completion;
pub use delete::delete;
pub use init::init;
pub use insert::insert;
pub use options::options;
pub use schema_cmd::schema;
pub use select::select;
pub use update::update;

use crate::cli::args::Command;
use crate::cli::Context;
use crate::engine::Dataset;
use anyhow::{Context as _, Result};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init { pairs } => init(ctx, &pairs),
        Command::Schema => schema(ctx),
        Command::Select { input } => select(ctx, &input),
        Command::Options { input } => options(ctx, &input),
        Command::Build { input } => build(ctx, &input),
        Command::Insert { input } => insert(ctx, &input),
        Command::Update { input } => update(ctx, &input),
        Command::Delete { input } => delete(ctx, &input),
        Command::Completion { shell } => completion(shell),
    }
}

/// Open the dataset named by the context.
pub(crate) fn open_dataset(ctx: &Context) -> Result<Dataset> {
    let dir = ctx.dataset_dir()?;
    Dataset::open(&dir).with_context(|| format!("Failed to open dataset at {}", dir.display()))
}
