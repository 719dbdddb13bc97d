//! store::sort
//!
//! External merge sort of tablet-shaped files.
//!
//! Rows are read in runs of at most `run_lines`, each run is sorted and
//! deduplicated in memory and spilled to a run file, then all runs are
//! merged with a k-way heap merge. Output rows are strictly ascending by
//! `(first, second)`, so duplicates never survive a sort.
//!
//! A single run is never spilled; it goes straight to the sink.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::codec::encode_line;
use super::tablet::{Row, TabletError, TabletReader};

/// Sort `input` into `sink`.
///
/// Run files are created in `work_dir` and removed before returning.
pub fn sort_file<F>(
    input: &Path,
    work_dir: &Path,
    run_lines: usize,
    mut sink: F,
) -> Result<usize, TabletError>
where
    F: FnMut(&str, &str) -> Result<(), TabletError>,
{
    let run_lines = run_lines.max(1);
    let mut reader = TabletReader::open(input)?;
    let mut runs: Vec<PathBuf> = Vec::new();
    let mut buffer: Vec<Row> = Vec::with_capacity(run_lines.min(4096));

    loop {
        buffer.clear();
        for row in reader.by_ref().take(run_lines) {
            buffer.push(row?);
        }
        let exhausted = buffer.len() < run_lines;
        buffer.sort_unstable();
        buffer.dedup();

        if runs.is_empty() && exhausted {
            for (first, second) in &buffer {
                sink(first, second)?;
            }
            return Ok(buffer.len());
        }

        if !buffer.is_empty() {
            runs.push(spill_run(work_dir, runs.len(), &buffer)?);
        }
        if exhausted {
            break;
        }
    }

    tracing::debug!(runs = runs.len(), input = %input.display(), "merging sort runs");
    let written = merge_runs(&runs, &mut sink)?;
    for run in &runs {
        let _ = std::fs::remove_file(run);
    }
    Ok(written)
}

fn spill_run(work_dir: &Path, index: usize, rows: &[Row]) -> Result<PathBuf, TabletError> {
    let path = work_dir.join(format!("run-{index}.csv"));
    let write_err = |source| TabletError::Write {
        path: path.clone(),
        source,
    };

    let mut out = BufWriter::new(File::create(&path).map_err(write_err)?);
    for (first, second) in rows {
        writeln!(out, "{}", encode_line(first, second)).map_err(write_err)?;
    }
    out.flush().map_err(write_err)?;
    Ok(path)
}

fn merge_runs<F>(runs: &[PathBuf], sink: &mut F) -> Result<usize, TabletError>
where
    F: FnMut(&str, &str) -> Result<(), TabletError>,
{
    let mut readers = runs
        .iter()
        .map(|p| TabletReader::open(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (index, reader) in readers.iter_mut().enumerate() {
        if let Some(row) = reader.next() {
            heap.push(Reverse((row?, index)));
        }
    }

    let mut last: Option<Row> = None;
    let mut written = 0;
    while let Some(Reverse((row, index))) = heap.pop() {
        if let Some(next) = readers[index].next() {
            heap.push(Reverse((next?, index)));
        }
        if last.as_ref() == Some(&row) {
            continue;
        }
        sink(&row.0, &row.1)?;
        written += 1;
        last = Some(row);
    }
    Ok(written)
}
