//! core::ops
//!
//! Operation locking.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive dataset lock
//!
//! # Architecture
//!
//! Every mutating call acquires the exclusive dataset lock before it touches
//! the first tablet and releases it after the last rename.

pub mod lock;

pub use lock::{DatasetLock, LockError};
