//! store
//!
//! The tablet store: the storage boundary of a dataset.
//!
//! # Modules
//!
//! - [`codec`] - Two-field line encode/decode
//! - [`tablet`] - Emptiness checks and sequential reads
//! - [`writer`] - Atomic rewrite through a sibling temp directory
//! - [`sort`] - External merge sort for unsorted appends
//!
//! # Invariants
//!
//! Every tablet the store writes is sorted ascending by `(first, second)`,
//! holds no duplicate rows, and ends with exactly one newline. Callers that
//! cannot produce rows in order go through [`sort::sort_file`].

pub mod codec;
pub mod sort;
pub mod tablet;
pub mod writer;

pub use tablet::{is_empty, read_all, Row, TabletError, TabletReader};
pub use writer::{TabletRewrite, WriteOptions};
