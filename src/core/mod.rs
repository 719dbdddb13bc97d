//! core
//!
//! Core domain types, schemas, and operations for arbor.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName
//! - [`schema`] - Schema tree model: trunks, leaves, crown, nesting order
//! - [`record`] - Nested records and the Value sum type
//! - [`grain`] - Grains: sow/mow between records and tablet lines
//! - [`keys`] - Random key generation
//! - [`ops`] - Dataset locking
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for dataset storage
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - The schema is an explicit immutable value, never global state
//! - Record field shapes are an explicit sum type

pub mod config;
pub mod grain;
pub mod keys;
pub mod ops;
pub mod paths;
pub mod record;
pub mod schema;
pub mod types;
