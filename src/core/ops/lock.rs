//! core::ops::lock
//!
//! Single-writer guard for a dataset.
//!
//! Tablets are rewritten one at a time by the mutation engine. Two writers
//! interleaving their rewrites of the same tablet would lose rows, so every
//! insert, update and delete holds a [`DatasetLock`] until it returns.
//! Readers never take it: a reader only observes a complete old or a
//! complete new tablet, since each rewrite becomes visible through one rename.
//!
//! The guard is an advisory `flock`-style lock (via `fs2`) on
//! `<dataset>/.arbor/lock`. The holder writes its process id into the file so
//! a second writer can say who is in the way. Acquisition never waits.
//!
//! ```ignore
//! let guard = DatasetLock::acquire(&paths)?;
//! // rewrite tablets
//! drop(guard);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::DatasetPaths;

#[derive(Debug, Error)]
pub enum LockError {
    /// Another writer holds the guard. `holder` is its pid when recorded.
    #[error("dataset is locked by another writer{}", describe_holder(*holder))]
    AlreadyLocked { holder: Option<u32> },

    #[error("cannot open lock file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot lock {}: {source}", path.display())]
    Acquire {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot unlock {}: {source}", path.display())]
    Release {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive write access to one dataset, released on drop.
#[derive(Debug)]
pub struct DatasetLock {
    path: PathBuf,
    file: Option<File>,
}

impl DatasetLock {
    /// Take the writer lock or fail at once with [`LockError::AlreadyLocked`].
    ///
    /// Creates the `.arbor` state directory if the dataset has none yet.
    pub fn acquire(paths: &DatasetPaths) -> Result<Self, LockError> {
        let path = paths.lock_path();
        let open_err = |source| LockError::Open {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(paths.state_dir()).map_err(open_err)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(open_err)?;

        if let Err(source) = file.try_lock_exclusive() {
            if source.kind() == io::ErrorKind::WouldBlock {
                return Err(LockError::AlreadyLocked {
                    holder: read_holder(&mut file),
                });
            }
            return Err(LockError::Acquire { path, source });
        }

        // The pid is informational; a guard without it still excludes.
        if let Err(err) = write_holder(&mut file) {
            tracing::debug!("could not record lock holder in {}: {err}", path.display());
        }
        tracing::debug!("acquired writer lock {}", path.display());

        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Unlock and clear the recorded pid. Calling this again is a no-op.
    fn release(&mut self) -> Result<(), LockError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let _ = file.set_len(0);
        file.unlock().map_err(|source| LockError::Release {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for DatasetLock {
    fn drop(&mut self) {
        if self.release().is_err() {
            tracing::warn!("failed to unlock {}", self.path.display());
        }
    }
}

fn describe_holder(holder: Option<u32>) -> String {
    holder.map(|pid| format!(" (pid {pid})")).unwrap_or_default()
}

fn write_holder(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}
