//! Tabular bulk loader (spec.md §4.6): buffers tab-delimited rows, writes
//! them to a staging file, and issues a single bulk-ingest call against the
//! relational store once `batch_rows` rows have accumulated.

use std::io::Write;
use std::path::PathBuf;

use crate::error::LoadError;
use crate::transform::TabRow;

use super::{ingest_with_retry, LoaderState, RelationalSink};

pub struct TabularLoader<S: RelationalSink> {
    table: String,
    batch_rows: usize,
    producers_remaining: usize,
    staging_path: PathBuf,
    quarantine_path: PathBuf,
    buffer: Vec<TabRow>,
    state: LoaderState,
    sink: S,
}

impl<S: RelationalSink> TabularLoader<S> {
    pub fn new(
        table: impl Into<String>,
        batch_rows: usize,
        producers: usize,
        staging_path: PathBuf,
        quarantine_path: PathBuf,
        sink: S,
    ) -> Self {
        TabularLoader {
            table: table.into(),
            batch_rows,
            producers_remaining: producers,
            staging_path,
            quarantine_path,
            buffer: Vec::new(),
            state: LoaderState::Empty,
            sink,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// `Empty → Accumulating(n) → (n == batch_rows ? Flushing → Empty :
    /// Accumulating(n+1))` (spec.md §4.6).
    pub fn push(&mut self, row: TabRow) -> Result<(), LoadError> {
        self.buffer.push(row);
        self.state = LoaderState::Accumulating(self.buffer.len());
        if self.buffer.len() >= self.batch_rows {
            self.flush()?;
        }
        Ok(())
    }

    /// Observes one end-of-stream sentinel; once all declared producers
    /// have been observed, flushes the remainder and terminates.
    pub fn sentinel(&mut self) -> Result<(), LoadError> {
        self.producers_remaining = self.producers_remaining.saturating_sub(1);
        if self.producers_remaining == 0 {
            self.flush()?;
            self.state = LoaderState::Terminated;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LoadError> {
        if self.buffer.is_empty() {
            self.state = LoaderState::Empty;
            return Ok(());
        }
        self.state = LoaderState::Flushing;
        let rows = std::mem::take(&mut self.buffer);
        let table = self.table.clone();
        let staging_path = self.staging_path.clone();
        let quarantine_path = self.quarantine_path.clone();
        let sink = &mut self.sink;

        let result = ingest_with_retry(
            || {
                write_staging_file(&staging_path, &rows)?;
                sink.bulk_ingest(&table, &staging_path)?;
                let _ = std::fs::remove_file(&staging_path);
                Ok(())
            },
            || super::append_quarantine_lines(&quarantine_path, &rows),
        );

        self.state = LoaderState::Empty;
        result
    }
}

fn write_staging_file(path: &std::path::Path, rows: &[TabRow]) -> Result<(), LoadError> {
    let mut file = std::fs::File::create(path).map_err(|source| LoadError::BulkIngest {
        target: path.display().to_string(),
        source,
    })?;
    for row in rows {
        writeln!(file, "{}", row).map_err(|source| LoadError::BulkIngest {
            target: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoggingRelationalSink;

    fn loader(batch_rows: usize, producers: usize) -> (TabularLoader<LoggingRelationalSink>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging.tsv");
        let quarantine = dir.path().join("quarantine.tsv");
        (
            TabularLoader::new("revision", batch_rows, producers, staging, quarantine, LoggingRelationalSink::default()),
            dir,
        )
    }

    #[test]
    fn flushes_once_batch_threshold_is_reached() {
        let (mut loader, _dir) = loader(2, 1);
        loader.push("a".to_string()).unwrap();
        assert_eq!(loader.state(), LoaderState::Accumulating(1));
        loader.push("b".to_string()).unwrap();
        assert_eq!(loader.state(), LoaderState::Empty);
        assert_eq!(loader.sink.calls.len(), 1);
    }

    #[test]
    fn flushes_remainder_on_final_sentinel() {
        let (mut loader, _dir) = loader(10, 2);
        loader.push("a".to_string()).unwrap();
        loader.sentinel().unwrap();
        assert_eq!(loader.sink.calls.len(), 0);
        loader.sentinel().unwrap();
        assert_eq!(loader.sink.calls.len(), 1);
        assert_eq!(loader.state(), LoaderState::Terminated);
    }

    #[test]
    fn empty_loader_terminates_without_flushing() {
        let (mut loader, _dir) = loader(10, 1);
        loader.sentinel().unwrap();
        assert_eq!(loader.sink.calls.len(), 0);
        assert_eq!(loader.state(), LoaderState::Terminated);
    }
}
