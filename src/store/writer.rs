//! store::writer
//!
//! Atomic tablet rewrite.
//!
//! # Protocol
//!
//! 1. Create a temp directory next to the tablet (same filesystem)
//! 2. Stream the new content into a temp file inside it
//! 3. Flush, and fsync unless disabled by configuration
//! 4. Rename the temp file over the tablet, but only when the original or
//!    the new content is non-empty
//! 5. Remove the temp directory (on drop)
//!
//! The rename is the only visible state change. A failure at any earlier
//! step leaves the original tablet untouched; a crash may leave an orphaned
//! temp directory behind, which readers never look at.
//!
//! # Example
//!
//! ```no_run
//! use arbordb::store::writer::{TabletRewrite, WriteOptions};
//! use std::path::Path;
//!
//! let mut rewrite = TabletRewrite::begin(Path::new("/data/datum-actname.csv"), WriteOptions::default())?;
//! rewrite.write_row("k1", "name1")?;
//! rewrite.commit()?;
//! # Ok::<(), arbordb::store::tablet::TabletError>(())
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::codec::encode_line;
use super::tablet::{is_empty, TabletError};

/// Prefix of the sibling temp directories created during a rewrite.
pub const TEMP_DIR_PREFIX: &str = ".arbor-tmp-";

/// Options for a rewrite.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Sync the temp file to disk before the rename.
    pub fsync: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { fsync: true }
    }
}

/// An in-progress rewrite of one tablet.
///
/// Dropping the rewrite without calling [`commit`](Self::commit) abandons it
/// and removes the temp directory.
pub struct TabletRewrite {
    target: PathBuf,
    dir: TempDir,
    temp_path: PathBuf,
    out: BufWriter<File>,
    rows: usize,
    options: WriteOptions,
}

impl TabletRewrite {
    /// Start rewriting `target`.
    pub fn begin(target: &Path, options: WriteOptions) -> Result<Self, TabletError> {
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let write_err = |source| TabletError::Write {
            path: target.to_path_buf(),
            source,
        };

        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir_in(parent)
            .map_err(write_err)?;
        let temp_path = dir.path().join("tablet.csv");
        let file = File::create(&temp_path).map_err(write_err)?;

        Ok(Self {
            target: target.to_path_buf(),
            dir,
            temp_path,
            out: BufWriter::new(file),
            rows: 0,
            options,
        })
    }

    /// Append one row to the new content.
    pub fn write_row(&mut self, first: &str, second: &str) -> Result<(), TabletError> {
        let line = encode_line(first, second);
        writeln!(self.out, "{line}").map_err(|source| TabletError::Write {
            path: self.temp_path.clone(),
            source,
        })?;
        self.rows += 1;
        Ok(())
    }

    /// A path inside this rewrite's temp directory for scratch files.
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// The temp directory, for scratch work such as sort runs.
    pub fn scratch_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Finish the rewrite.
    ///
    /// Returns whether the tablet was replaced. When both the original and the
    /// new content are empty nothing is renamed and no file is created.
    pub fn commit(self) -> Result<bool, TabletError> {
        let Self {
            target,
            dir,
            temp_path,
            out,
            rows,
            options,
        } = self;

        let write_err = |source| TabletError::Write {
            path: temp_path.clone(),
            source,
        };
        let file = out.into_inner().map_err(|e| write_err(e.into_error()))?;
        if options.fsync {
            file.sync_all().map_err(write_err)?;
        }
        drop(file);

        if rows == 0 && is_empty(&target)? {
            tracing::debug!(tablet = %target.display(), "rewrite left empty tablet untouched");
            return Ok(false);
        }

        #[cfg(any(test, feature = "fault_injection"))]
        if fault_injection::should_crash() {
            return Err(TabletError::Write {
                path: target,
                source: std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "simulated crash for fault injection testing",
                ),
            });
        }

        std::fs::rename(&temp_path, &target).map_err(|source| TabletError::Write {
            path: target.clone(),
            source,
        })?;
        tracing::debug!(tablet = %target.display(), rows, "tablet replaced");

        if let Err(e) = dir.close() {
            tracing::warn!(error = %e, "failed to remove rewrite temp directory");
        }
        Ok(true)
    }
}

/// Fault injection for crash testing.
///
/// When armed, the Nth commit from the current thread fails right before
/// its rename, as if the process died there.
///
/// ```ignore
/// use arbordb::store::writer::fault_injection;
///
/// fault_injection::set_crash_after(2);
/// // the second tablet commit of the next mutation fails before renaming
/// fault_injection::reset();
/// ```
#[cfg(any(test, feature = "fault_injection"))]
pub mod fault_injection {
    use std::cell::Cell;

    thread_local! {
        /// Fail the Nth commit. 0 disables.
        static CRASH_AFTER_COMMITS: Cell<usize> = const { Cell::new(0) };

        static COMMIT_COUNT: Cell<usize> = const { Cell::new(0) };
    }

    /// Fail the `n`th commit from now. 0 disables.
    pub fn set_crash_after(n: usize) {
        CRASH_AFTER_COMMITS.with(|c| c.set(n));
        COMMIT_COUNT.with(|c| c.set(0));
    }

    /// Count one commit and report whether it should fail.
    pub fn should_crash() -> bool {
        CRASH_AFTER_COMMITS.with(|threshold_cell| {
            let threshold = threshold_cell.get();
            if threshold == 0 {
                return false;
            }
            COMMIT_COUNT.with(|count_cell| {
                let count = count_cell.get() + 1;
                count_cell.set(count);
                count >= threshold
            })
        })
    }

    /// Disarm.
    pub fn reset() {
        CRASH_AFTER_COMMITS.with(|c| c.set(0));
        COMMIT_COUNT.with(|c| c.set(0));
    }
}
