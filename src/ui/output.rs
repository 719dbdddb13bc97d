//! ui::output
//!
//! Terminal output.
//!
//! Results go to stdout as JSON (or `trunk:leaf` lines for the schema) and
//! are never suppressed, so they can be piped into another `arbor` call.
//! Status and error messages go to stderr.

use std::fmt::Display;

use serde::Serialize;

/// How chatty stderr should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Debug,
}

impl Verbosity {
    /// `--quiet` wins over `--debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        match (quiet, debug) {
            (true, _) => Self::Quiet,
            (false, true) => Self::Debug,
            (false, false) => Self::Normal,
        }
    }

    fn shows_status(self) -> bool {
        self != Self::Quiet
    }
}

/// Always shown, prefixed with `error:`.
pub fn error(message: impl Display) {
    eprintln!("error: {message}");
}

/// A one-line status report on stderr, dropped under `--quiet`.
pub fn success(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_status() {
        eprintln!("{message}");
    }
}

pub fn format_json<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

/// Write a result to stdout.
pub fn json<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<()> {
    println!("{}", format_json(value, pretty)?);
    Ok(())
}

/// `trunk:leaf`, one pair per line, no trailing newline.
pub fn format_pairs<A: Display, B: Display>(pairs: &[(A, B)]) -> String {
    let lines: Vec<String> = pairs
        .iter()
        .map(|(trunk, leaf)| format!("{trunk}:{leaf}"))
        .collect();
    lines.join("\n")
}
