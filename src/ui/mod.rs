//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All terminal output goes through this module so that results (JSON on
//! stdout) and messages (stderr) are kept apart and the quiet flag is
//! honored in one place.

pub mod output;
