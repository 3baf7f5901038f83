//! Loader stage (spec.md §4.6): accumulates load-ready rows/documents and
//! performs a single bulk operation per batch. Both variants below share
//! the `Empty → Accumulating(n) → Flushing → (Empty | Terminated)` state
//! machine and the retry-then-quarantine failure policy; only the shape of
//! a batch and the bulk-ingest call differ.

pub mod search;
pub mod tabular;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::LoadError;

pub use search::SearchLoader;
pub use tabular::TabularLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Empty,
    Accumulating(usize),
    Flushing,
    Terminated,
}

/// One retry with exponential backoff, matching spec.md §4.6/§7 ("bulk-load
/// failure is retried once with exponential backoff; on second failure,
/// the rows are appended to a quarantine file"). `attempt` is called at
/// most twice; on a second failure `quarantine` receives control instead
/// of the error — the loader must not abort the dump.
pub(crate) fn ingest_with_retry(
    mut attempt: impl FnMut() -> Result<(), LoadError>,
    quarantine: impl FnOnce() -> Result<(), LoadError>,
) -> Result<(), LoadError> {
    match attempt() {
        Ok(()) => Ok(()),
        Err(first_err) => {
            tracing::warn!(message = "bulk load failed, retrying once", error = %first_err);
            thread::sleep(Duration::from_millis(200));
            match attempt() {
                Ok(()) => Ok(()),
                Err(second_err) => {
                    tracing::error!(
                        message = "bulk load failed twice, quarantining batch",
                        error = %second_err
                    );
                    quarantine()
                }
            }
        }
    }
}

/// Appends already-formatted lines to a quarantine file, creating it if
/// necessary. Shared by both loader variants.
pub(crate) fn append_quarantine_lines(path: &Path, lines: &[String]) -> Result<(), LoadError> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoadError::Quarantine {
            path: path.to_path_buf(),
            source,
        })?;
    for line in lines {
        writeln!(file, "{}", line).map_err(|source| LoadError::Quarantine {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// The external relational bulk-ingest protocol (spec.md §6): "a tabular
/// store speaking a LOAD-DATA-style bulk-ingest protocol." The wire
/// dialect is fixed (tab-separated, optionally double-quoted, escape
/// character double quote — carried over from
/// `revision.py::revs_file_to_db`'s `LOAD DATA LOCAL INFILE` statement);
/// the transport itself is an external collaborator (spec.md §1 OUT OF
/// SCOPE: "database schema creation and index rebuilding"), so the core
/// only defines the interface a deployment plugs a real driver into.
pub trait RelationalSink: Send {
    fn bulk_ingest(&mut self, table: &str, staging_file: &Path) -> Result<(), LoadError>;
}

/// The external search bulk-request protocol (spec.md §6).
pub trait SearchSink: Send {
    fn bulk_index(&mut self, index: &str, docs: &[crate::transform::SearchDoc]) -> Result<(), LoadError>;
}

impl RelationalSink for Box<dyn RelationalSink> {
    fn bulk_ingest(&mut self, table: &str, staging_file: &Path) -> Result<(), LoadError> {
        (**self).bulk_ingest(table, staging_file)
    }
}

impl SearchSink for Box<dyn SearchSink> {
    fn bulk_index(&mut self, index: &str, docs: &[crate::transform::SearchDoc]) -> Result<(), LoadError> {
        (**self).bulk_index(index, docs)
    }
}

/// Lets a test (or an operator wiring a shared connection pool) retain a
/// handle to a sink after handing a clone to the orchestrator.
impl<T: RelationalSink> RelationalSink for std::sync::Arc<std::sync::Mutex<T>> {
    fn bulk_ingest(&mut self, table: &str, staging_file: &Path) -> Result<(), LoadError> {
        self.lock().unwrap().bulk_ingest(table, staging_file)
    }
}

impl<T: SearchSink> SearchSink for std::sync::Arc<std::sync::Mutex<T>> {
    fn bulk_index(&mut self, index: &str, docs: &[crate::transform::SearchDoc]) -> Result<(), LoadError> {
        self.lock().unwrap().bulk_index(index, docs)
    }
}

/// Records every call instead of touching a network; useful for tests and
/// as a safe default before an operator wires in a real driver.
#[derive(Debug, Default)]
pub struct LoggingRelationalSink {
    pub calls: Vec<(String, PathBuf)>,
}

impl RelationalSink for LoggingRelationalSink {
    fn bulk_ingest(&mut self, table: &str, staging_file: &Path) -> Result<(), LoadError> {
        self.calls.push((table.to_string(), staging_file.to_path_buf()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggingSearchSink {
    pub batches: Vec<(String, usize)>,
}

impl SearchSink for LoggingSearchSink {
    fn bulk_index(&mut self, index: &str, docs: &[crate::transform::SearchDoc]) -> Result<(), LoadError> {
        self.batches.push((index.to_string(), docs.len()));
        Ok(())
    }
}
