//! Error taxonomy for the pipeline (spec.md §7).
//!
//! Each error kind is scoped to the boundary at which it is raised:
//! [`UnsupportedLanguage`] and other startup errors abort the process,
//! [`ExtractionError`] aborts a single dump, [`RecordError`] is dropped by
//! the transformer worker that raised it, [`LoadError`] triggers a retry
//! then quarantine, and [`CacheError`] only degrades identity-map writes to
//! best-effort.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
#[error("unsupported language: {0:?} is absent from the FA, FLIST, and GA pattern registries")]
pub struct UnsupportedLanguage(pub compact_str::CompactString);

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("malformed XML in {path:?} at byte offset {offset}")]
    Xml {
        path: PathBuf,
        offset: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("unexpected end of file in {path:?}")]
    Eof { path: PathBuf },
    #[error("failed to open dump file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn decompressor for {path:?}")]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Only raised with the `strict` feature enabled; without it a record
    /// missing a mandatory field is dropped with a warning instead.
    #[error("malformed record in {path:?}: {reason}")]
    MalformedRecord { path: PathBuf, reason: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("missing mandatory field `{0}` on record")]
    MissingField(&'static str),
    #[error("malformed timestamp {0:?}")]
    MalformedTimestamp(String),
    #[error("invalid namespace id {0:?}")]
    InvalidNamespace(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("bulk load into {target} failed")]
    BulkIngest {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("quarantine file {path:?} could not be written")]
    Quarantine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("identity cache unreachable: {0}")]
    Unreachable(String),
}

/// Produced by the downloader, not the core; surfaced to the operator
/// before the core is invoked on the affected dump (spec.md §7).
#[derive(Debug, thiserror::Error)]
#[error("dump integrity check failed for {path:?}: {reason}")]
pub struct IntegrityError {
    pub path: PathBuf,
    pub reason: String,
}
