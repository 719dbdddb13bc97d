//! Arbor - a schema-driven flat-file tree database
//!
//! Records are a forest of typed branches. Every trunk/leaf relation of the
//! schema is persisted as one sorted two-column file (a tablet), and queries
//! are answered by streaming sort-merge joins over those files without
//! loading the dataset into memory.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Planning, matching, and mutation over an open [`engine::Dataset`]
//! - [`store`] - Tablet codec, sequential reads, atomic rewrites, external sort
//! - [`core`] - Domain types: schema, records, grains, paths, configuration
//! - [`ui`] - Output utilities
//!
//! # Correctness Invariants
//!
//! Arbor maintains the following invariants:
//!
//! 1. Every tablet it writes is sorted, duplicate-free, and newline-terminated
//! 2. A tablet is replaced only by rename, so a crash leaves it whole
//! 3. Branch references are checked against the schema before any tablet is read
//! 4. Mutations are serialized by an exclusive dataset lock

pub mod cli;
pub mod core;
pub mod engine;
pub mod store;
pub mod ui;
