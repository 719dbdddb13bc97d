//! store::tablet
//!
//! Sequential tablet reads.
//!
//! # Invariants
//!
//! - A missing tablet and a zero-byte tablet are both empty; neither is an error
//! - Lines are yielded in file order, one trailing blank line is ignored
//! - A line that does not decode to two fields fails with
//!   [`TabletError::MalformedLine`] naming the file and 1-based line number

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::iter::Peekable;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::codec::{decode_line, CodecError};

/// One decoded tablet line: `(first, second)`.
pub type Row = (String, String);

/// Errors from tablet I/O.
#[derive(Debug, Error)]
pub enum TabletError {
    #[error("failed to read tablet '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write tablet '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("malformed line {line_no} in '{path}': {reason}")]
    MalformedLine {
        path: PathBuf,
        line_no: usize,
        reason: CodecError,
    },
}

/// Whether a tablet has no rows: it does not exist or has zero bytes.
pub fn is_empty(path: &Path) -> Result<bool, TabletError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len() == 0),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(TabletError::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// A pull-driven reader over the rows of one tablet.
///
/// Each call to `next` reads one line; nothing beyond the current line is
/// buffered.
pub struct TabletReader {
    path: PathBuf,
    lines: Option<Peekable<Lines<BufReader<File>>>>,
    line_no: usize,
}

impl TabletReader {
    /// Open a tablet. A missing tablet yields no rows.
    pub fn open(path: &Path) -> Result<Self, TabletError> {
        let lines = match File::open(path) {
            Ok(file) => Some(BufReader::new(file).lines().peekable()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(TabletError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            lines,
            line_no: 0,
        })
    }

    /// The tablet path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for TabletReader {
    type Item = Result<Row, TabletError>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;
        let line = match lines.next()? {
            Ok(line) => line,
            Err(e) => {
                return Some(Err(TabletError::Read {
                    path: self.path.clone(),
                    source: e,
                }))
            }
        };
        self.line_no += 1;

        if line.is_empty() && lines.peek().is_none() {
            return None;
        }

        Some(decode_line(&line).map_err(|reason| TabletError::MalformedLine {
            path: self.path.clone(),
            line_no: self.line_no,
            reason,
        }))
    }
}

/// Read every row of a tablet into memory.
pub fn read_all(path: &Path) -> Result<Vec<Row>, TabletError> {
    TabletReader::open(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_and_zero_byte_tablets_are_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("datum-actname.csv");
        assert!(is_empty(&path).unwrap());
        assert!(read_all(&path).unwrap().is_empty());

        fs::write(&path, "").unwrap();
        assert!(is_empty(&path).unwrap());
        assert!(read_all(&path).unwrap().is_empty());

        fs::write(&path, "k,v\n").unwrap();
        assert!(!is_empty(&path).unwrap());
    }

    #[test]
    fn reads_rows_in_order_ignoring_trailing_blank_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t.csv");
        fs::write(&path, "a,1\nb,2\n\n").unwrap();

        let rows = read_all(&path).unwrap();
        assert_eq!(
            rows,
            vec![("a".into(), "1".into()), ("b".into(), "2".into())]
        );
    }

    #[test]
    fn malformed_line_reports_position() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t.csv");
        fs::write(&path, "a,1\nbroken\nc,3\n").unwrap();

        let err = read_all(&path).unwrap_err();
        match err {
            TabletError::MalformedLine { line_no, path: p, .. } => {
                assert_eq!(line_no, 2);
                assert_eq!(p, path);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_line_in_the_middle_is_malformed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t.csv");
        fs::write(&path, "a,1\n\nc,3\n").unwrap();
        assert!(matches!(
            read_all(&path),
            Err(TabletError::MalformedLine { line_no: 2, .. })
        ));
    }
}
