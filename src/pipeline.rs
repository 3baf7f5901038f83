//! Orchestrator (spec.md §4.7): wires one Extractor, N transformers per
//! stream, and one Loader per sink around bounded channels, for a single
//! dump file; `run_all` drains a shared work queue terminated by a `Stop`
//! sentinel, directly modeled on `etl.py::RevisionHistoryETL.run`'s
//! `for path in iter(self.paths_queue.get, 'STOP')` loop and its
//! `task_done()` acknowledgment, translated from a `multiprocessing.Queue`
//! to a `crossbeam_channel` plus an explicit ack callback.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use crossbeam_channel::{bounded, Receiver};

use crate::decompress;
use crate::dump_parser::{DumpKind, Envelope, Extractor, LogItemRecord, PageRecord, RevisionRecord};
use crate::error::ExtractionError;
use crate::identity::{IdentityCache, IdentityMap, IdentityService};
use crate::loader::{RelationalSink, SearchLoader, SearchSink, TabularLoader};
use crate::patterns::LanguagePatterns;
use crate::transform::{logitem, page, revision};

/// Fan-outs, batch sizes, and paths the binary exposes as `clap(env = ...)`
/// flags rather than hardcoding.
#[derive(Debug, Clone)]
pub struct Config {
    pub page_fan: usize,
    pub rev_fan: usize,
    pub log_fan: usize,
    pub channel_capacity: usize,
    pub batch_rows: usize,
    pub batch_docs: usize,
    pub staging_dir: PathBuf,
    pub quarantine_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_fan: 2,
            rev_fan: 4,
            log_fan: 2,
            channel_capacity: 256,
            batch_rows: 1000,
            batch_docs: 500,
            staging_dir: std::env::temp_dir(),
            quarantine_dir: std::env::temp_dir(),
        }
    }
}

/// One unit of work for `run_all`'s shared queue (spec.md §4.7's `STOP`
/// sentinel, generalized to a typed enum instead of a magic string).
#[derive(Debug, Clone)]
pub enum DumpJob {
    Process {
        path: PathBuf,
        lang: CompactString,
        kind: DumpKind,
    },
    Stop,
}

pub struct DumpOutcome {
    pub path: PathBuf,
    pub result: Result<(), ExtractionError>,
}

/// The sinks a single `run_dump` call needs — one relational connection per
/// table, one search connection, each "scoped to a worker and released
/// deterministically on worker exit" (spec.md §5).
pub struct DumpSinks<R1, R2, R3, S> {
    pub page: R1,
    pub revision: R2,
    pub logitem: R3,
    pub search: S,
}

/// Runs the full E → T → L topology for one dump file and blocks until
/// every worker has joined.
#[allow(clippy::too_many_arguments)]
pub fn run_dump<R1, R2, R3, S>(
    path: &Path,
    lang: &str,
    kind: DumpKind,
    cfg: &Config,
    identity_map: &IdentityMap,
    cache: &dyn IdentityCache,
    lang_patterns: &LanguagePatterns,
    sinks: DumpSinks<R1, R2, R3, S>,
) -> Result<(), ExtractionError>
where
    R1: RelationalSink,
    R2: RelationalSink,
    R3: RelationalSink,
    S: SearchSink,
{
    let source = decompress::open(path)?;
    let extractor = Extractor::new(path, kind, source);

    let (page_tx, page_rx) = bounded(cfg.channel_capacity);
    let (rev_tx, rev_rx) = bounded(cfg.channel_capacity);
    let (log_tx, log_rx) = bounded(cfg.channel_capacity);

    let page_fan = if matches!(kind, DumpKind::Logging) { 0 } else { cfg.page_fan };
    let rev_fan = if matches!(kind, DumpKind::Logging) { 0 } else { cfg.rev_fan };
    let log_fan = if matches!(kind, DumpKind::Logging) { cfg.log_fan } else { 0 };

    let (page_row_tx, page_row_rx) = bounded::<Envelope<String>>(cfg.channel_capacity);
    let (rev_row_tx, rev_row_rx) = bounded::<Envelope<String>>(cfg.channel_capacity);
    let (search_doc_tx, search_doc_rx) = bounded::<Envelope<crate::transform::SearchDoc>>(cfg.channel_capacity);
    let (log_row_tx, log_row_rx) = bounded::<Envelope<String>>(cfg.channel_capacity);

    let page_staging = cfg.staging_dir.join(format!("{lang}-page.tsv"));
    let page_quarantine = cfg.quarantine_dir.join(format!("{lang}-page.quarantine.tsv"));
    let rev_staging = cfg.staging_dir.join(format!("{lang}-revision.tsv"));
    let rev_quarantine = cfg.quarantine_dir.join(format!("{lang}-revision.quarantine.tsv"));
    let log_staging = cfg.staging_dir.join(format!("{lang}-logging.tsv"));
    let log_quarantine = cfg.quarantine_dir.join(format!("{lang}-logging.quarantine.tsv"));
    let search_quarantine = cfg.quarantine_dir.join(format!("{lang}-search.quarantine.tsv"));

    let extraction_result = std::thread::scope(|scope| {
        // Loaders: one long-lived thread per sink, draining its own channel.
        let DumpSinks {
            page: page_sink,
            revision: rev_sink,
            logitem: log_sink,
            search: search_sink,
        } = sinks;

        let page_loader = scope.spawn(move || {
            let mut loader = TabularLoader::new("page", cfg.batch_rows, page_fan.max(1), page_staging, page_quarantine, page_sink);
            drain_rows(&page_row_rx, &mut loader);
        });
        let rev_loader = scope.spawn(move || {
            let mut loader = TabularLoader::new("revision", cfg.batch_rows, rev_fan.max(1), rev_staging, rev_quarantine, rev_sink);
            drain_rows(&rev_row_rx, &mut loader);
        });
        let log_loader = scope.spawn(move || {
            let mut loader = TabularLoader::new("logging", cfg.batch_rows, log_fan.max(1), log_staging, log_quarantine, log_sink);
            drain_rows(&log_row_rx, &mut loader);
        });
        let search_loader = scope.spawn(move || {
            let mut loader = SearchLoader::new(lang.to_string(), cfg.batch_docs, rev_fan.max(1), search_quarantine, search_sink);
            drain_docs(&search_doc_rx, &mut loader);
        });

        // Page transformers.
        let mut page_workers = Vec::new();
        for _ in 0..page_fan {
            let rx = page_rx.clone();
            let tx = page_row_tx.clone();
            page_workers.push(scope.spawn(move || run_page_worker(&rx, &tx)));
        }
        drop(page_row_tx);

        // Revision transformers.
        let mut rev_workers = Vec::new();
        for _ in 0..rev_fan {
            let rx = rev_rx.clone();
            let row_tx = rev_row_tx.clone();
            let doc_tx = search_doc_tx.clone();
            rev_workers.push(scope.spawn(move || {
                let identity = IdentityService::new(identity_map, cache, lang);
                run_revision_worker(&rx, &row_tx, &doc_tx, lang_patterns, &identity)
            }));
        }
        drop(rev_row_tx);
        drop(search_doc_tx);

        // Log-item transformers.
        let mut log_workers = Vec::new();
        for _ in 0..log_fan {
            let rx = log_rx.clone();
            let tx = log_row_tx.clone();
            log_workers.push(scope.spawn(move || {
                let identity = IdentityService::new(identity_map, cache, lang);
                run_logitem_worker(&rx, &tx, &identity)
            }));
        }
        drop(log_row_tx);

        let extraction_result = extractor.run(page_tx, page_fan, rev_tx, rev_fan, log_tx, log_fan);

        for w in page_workers {
            let _ = w.join();
        }
        for w in rev_workers {
            let _ = w.join();
        }
        for w in log_workers {
            let _ = w.join();
        }
        let _ = page_loader.join();
        let _ = rev_loader.join();
        let _ = log_loader.join();
        let _ = search_loader.join();

        extraction_result
    });

    extraction_result
}

fn run_page_worker(rx: &Receiver<Envelope<PageRecord>>, tx: &crossbeam_channel::Sender<Envelope<String>>) {
    loop {
        match rx.recv() {
            Ok(Envelope::Record(rec)) => {
                let row = page::transform_page(&rec);
                let _ = tx.send(Envelope::Record(row));
            }
            Ok(Envelope::EndOfStream) | Err(_) => {
                let _ = tx.send(Envelope::EndOfStream);
                break;
            }
        }
    }
}

fn run_revision_worker(
    rx: &Receiver<Envelope<RevisionRecord>>,
    row_tx: &crossbeam_channel::Sender<Envelope<String>>,
    doc_tx: &crossbeam_channel::Sender<Envelope<crate::transform::SearchDoc>>,
    patterns: &LanguagePatterns,
    identity: &IdentityService,
) {
    loop {
        match rx.recv() {
            Ok(Envelope::Record(rec)) => match revision::transform_revision(&rec, patterns, identity) {
                Ok((row, doc)) => {
                    let _ = row_tx.send(Envelope::Record(row));
                    if let Some(doc) = doc {
                        let _ = doc_tx.send(Envelope::Record(doc));
                    }
                }
                Err(e) => tracing::warn!(message = "dropping malformed revision", error = %e),
            },
            Ok(Envelope::EndOfStream) | Err(_) => {
                let _ = row_tx.send(Envelope::EndOfStream);
                let _ = doc_tx.send(Envelope::EndOfStream);
                break;
            }
        }
    }
}

fn run_logitem_worker(
    rx: &Receiver<Envelope<LogItemRecord>>,
    tx: &crossbeam_channel::Sender<Envelope<String>>,
    identity: &IdentityService,
) {
    loop {
        match rx.recv() {
            Ok(Envelope::Record(rec)) => match logitem::transform_logitem(&rec, identity) {
                Ok(row) => {
                    let _ = tx.send(Envelope::Record(row));
                }
                Err(e) => tracing::warn!(message = "dropping malformed log item", error = %e),
            },
            Ok(Envelope::EndOfStream) | Err(_) => {
                let _ = tx.send(Envelope::EndOfStream);
                break;
            }
        }
    }
}

fn drain_rows<S: RelationalSink>(rx: &Receiver<Envelope<String>>, loader: &mut TabularLoader<S>) {
    loop {
        match rx.recv() {
            Ok(Envelope::Record(row)) => {
                if let Err(e) = loader.push(row) {
                    tracing::error!(message = "tabular loader push failed", error = %e);
                }
            }
            Ok(Envelope::EndOfStream) => {
                if let Err(e) = loader.sentinel() {
                    tracing::error!(message = "tabular loader sentinel flush failed", error = %e);
                }
                if loader.state() == crate::loader::LoaderState::Terminated {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

fn drain_docs<S: SearchSink>(rx: &Receiver<Envelope<crate::transform::SearchDoc>>, loader: &mut SearchLoader<S>) {
    loop {
        match rx.recv() {
            Ok(Envelope::Record(doc)) => {
                if let Err(e) = loader.push(doc) {
                    tracing::error!(message = "search loader push failed", error = %e);
                }
            }
            Ok(Envelope::EndOfStream) => {
                if let Err(e) = loader.sentinel() {
                    tracing::error!(message = "search loader sentinel flush failed", error = %e);
                }
                if loader.state() == crate::loader::LoaderState::Terminated {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

/// Drains the shared work queue until `DumpJob::Stop`, running `run_dump`
/// for each path and invoking `ack` once it completes — the `crossbeam`
/// translation of `etl.py`'s `self.paths_queue.task_done()`.
#[allow(clippy::too_many_arguments)]
pub fn run_all<R1, R2, R3, S>(
    queue: &Receiver<DumpJob>,
    cfg: &Config,
    identity_map: &IdentityMap,
    cache: &dyn IdentityCache,
    patterns: &crate::patterns::PatternRegistry,
    mut make_sinks: impl FnMut() -> Result<DumpSinks<R1, R2, R3, S>, crate::error::UnsupportedLanguage>,
    mut ack: impl FnMut(&DumpOutcome),
) -> Result<Vec<DumpOutcome>, crate::error::UnsupportedLanguage>
where
    R1: RelationalSink,
    R2: RelationalSink,
    R3: RelationalSink,
    S: SearchSink,
{
    let mut outcomes = Vec::new();
    loop {
        match queue.recv() {
            Ok(DumpJob::Process { path, lang, kind }) => {
                let lang_patterns = patterns.for_language(&lang)?;
                let sinks = make_sinks()?;
                let result = run_dump(&path, &lang, kind, cfg, identity_map, cache, lang_patterns, sinks);
                let outcome = DumpOutcome { path, result };
                ack(&outcome);
                outcomes.push(outcome);
            }
            Ok(DumpJob::Stop) | Err(_) => break,
        }
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NullCache;
    use crate::loader::{LoggingRelationalSink, LoggingSearchSink};
    use crate::patterns::PatternRegistry;

    /// spec.md §8 scenario 5: 1 page-worker, 3 revision-workers over a dump
    /// with 1 page and 7 revisions (none redirects).
    #[test]
    fn end_to_end_fan_matches_scenario_five() {
        let dir = tempfile::tempdir().unwrap();
        let dump_path = dir.path().join("enwiki-sample.xml");

        let mut revisions = String::new();
        for i in 0..7 {
            revisions.push_str(&format!(
                "<revision><id>{}</id><timestamp>2020-01-01T00:00:0{}Z</timestamp>\
                 <contributor><ip>10.0.0.1</ip></contributor><text>hello world</text></revision>",
                100 + i,
                i
            ));
        }
        let xml = format!(
            "<mediawiki><page><title>Sample</title><ns>0</ns><id>5</id>{}</page></mediawiki>",
            revisions
        );
        std::fs::write(&dump_path, xml).unwrap();

        let cfg = Config {
            page_fan: 1,
            rev_fan: 3,
            log_fan: 1,
            channel_capacity: 32,
            batch_rows: 1000,
            batch_docs: 1000,
            staging_dir: dir.path().to_path_buf(),
            quarantine_dir: dir.path().to_path_buf(),
        };

        let identity_map = IdentityMap::new();
        let cache = NullCache;
        let registry = PatternRegistry::builtin();
        let lang_patterns = registry.for_language("enwiki").unwrap();

        use std::sync::{Arc, Mutex};
        let page_sink = Arc::new(Mutex::new(LoggingRelationalSink::default()));
        let rev_sink = Arc::new(Mutex::new(LoggingRelationalSink::default()));
        let log_sink = Arc::new(Mutex::new(LoggingRelationalSink::default()));
        let search_sink = Arc::new(Mutex::new(LoggingSearchSink::default()));

        let sinks = DumpSinks {
            page: page_sink.clone(),
            revision: rev_sink.clone(),
            logitem: log_sink.clone(),
            search: search_sink.clone(),
        };

        let result = run_dump(
            &dump_path,
            "enwiki",
            DumpKind::RevisionHistory,
            &cfg,
            &identity_map,
            &cache,
            lang_patterns,
            sinks,
        );

        assert!(result.is_ok());
        assert_eq!(identity_map.snapshot_anon_revs().len(), 7);

        // Page loader flushed exactly once, carrying the single page row;
        // revision loader flushed once carrying all 7 revisions; the
        // search loader got the same 7 (none are redirects).
        assert_eq!(page_sink.lock().unwrap().calls.len(), 1);
        assert_eq!(rev_sink.lock().unwrap().calls.len(), 1);
        assert_eq!(search_sink.lock().unwrap().batches, vec![("enwiki".to_string(), 7)]);
    }
}
