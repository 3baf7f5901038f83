//! Transformer stage (spec.md §4.2-§4.4): consumes typed records from the
//! extractor and emits load-ready rows/documents. Each transformer is a
//! plain function called in a loop by a worker thread — "stateless,
//! single-threaded per worker" (spec.md §4.2) — rather than an actor
//! carrying its own mutable state.

pub mod logitem;
pub mod page;
pub mod revision;

use compact_str::CompactString;

/// A single tab-delimited, already-escaped relational row, ready to be
/// appended to a loader's batch verbatim (spec.md §4.6 wire format).
pub type TabRow = String;

/// The structured document emitted for the search index (spec.md §4.3
/// step 6).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDoc {
    pub rev_id: i64,
    pub timestamp: CompactString,
    pub parent_id: i64,
    pub page_id: i64,
    pub comment: CompactString,
    pub text: String,
}

/// Replaces the `T` separator with a space and drops a trailing `Z`
/// (spec.md §4.3 step 5), grounded on `revision.py`'s
/// `.replace('Z','').replace('T',' ')`.
pub fn normalize_timestamp(raw: &str) -> CompactString {
    let without_zulu = raw.strip_suffix('Z').unwrap_or(raw);
    without_zulu.replacen('T', " ", 1).into()
}
