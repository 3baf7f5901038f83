//! Search bulk loader (spec.md §4.6): accumulates documents in memory and
//! issues a single bulk request to the search index on threshold.

use crate::error::LoadError;
use crate::transform::SearchDoc;

use super::{ingest_with_retry, LoaderState, SearchSink};

pub struct SearchLoader<S: SearchSink> {
    index: String,
    batch_docs: usize,
    producers_remaining: usize,
    quarantine_path: std::path::PathBuf,
    buffer: Vec<SearchDoc>,
    state: LoaderState,
    sink: S,
}

impl<S: SearchSink> SearchLoader<S> {
    pub fn new(
        index: impl Into<String>,
        batch_docs: usize,
        producers: usize,
        quarantine_path: std::path::PathBuf,
        sink: S,
    ) -> Self {
        SearchLoader {
            index: index.into(),
            batch_docs,
            producers_remaining: producers,
            quarantine_path,
            buffer: Vec::new(),
            state: LoaderState::Empty,
            sink,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn push(&mut self, doc: SearchDoc) -> Result<(), LoadError> {
        self.buffer.push(doc);
        self.state = LoaderState::Accumulating(self.buffer.len());
        if self.buffer.len() >= self.batch_docs {
            self.flush()?;
        }
        Ok(())
    }

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
        let docs = std::mem::take(&mut self.buffer);
        let index = self.index.clone();
        let quarantine_path = self.quarantine_path.clone();
        let sink = &mut self.sink;

        let result = ingest_with_retry(
            || sink.bulk_index(&index, &docs),
            || {
                let lines: Vec<String> = docs.iter().map(|d| format!("{}\t{}", d.rev_id, d.text)).collect();
                super::append_quarantine_lines(&quarantine_path, &lines)
            },
        );

        self.state = LoaderState::Empty;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoggingSearchSink;
    use compact_str::CompactString;

    fn doc(rev_id: i64) -> SearchDoc {
        SearchDoc {
            rev_id,
            timestamp: CompactString::from("2020-01-01 00:00:00"),
            parent_id: -1,
            page_id: 1,
            comment: CompactString::from("NULL"),
            text: "hello".to_string(),
        }
    }

    #[test]
    fn flushes_once_batch_threshold_is_reached() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = SearchLoader::new("enwiki", 2, 1, dir.path().join("q.tsv"), LoggingSearchSink::default());
        loader.push(doc(1)).unwrap();
        assert_eq!(loader.state(), LoaderState::Accumulating(1));
        loader.push(doc(2)).unwrap();
        assert_eq!(loader.state(), LoaderState::Empty);
        assert_eq!(loader.sink.batches, vec![("enwiki".to_string(), 2)]);
    }

    #[test]
    fn counts_sentinels_from_every_producer_before_terminating() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = SearchLoader::new("enwiki", 10, 3, dir.path().join("q.tsv"), LoggingSearchSink::default());
        loader.push(doc(1)).unwrap();
        loader.sentinel().unwrap();
        loader.sentinel().unwrap();
        assert_eq!(loader.state(), LoaderState::Accumulating(1));
        loader.sentinel().unwrap();
        assert_eq!(loader.state(), LoaderState::Terminated);
        assert_eq!(loader.sink.batches.len(), 1);
    }
}
