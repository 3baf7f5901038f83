// SPDX-License-Identifier: MPL-2.0
//! # wikidump-etl
//!
//! A streaming ETL pipeline for Wikipedia XML dumps: a single-pass XML
//! extractor fans parsed pages, revisions, and log items out to parallel
//! transformer pools, resolves contributor identity through a shared
//! process-wide map, and bulk-loads the result into a relational store and
//! a full-text search index.
//!
//! ## Overview
//!
//! The pipeline is three stage types wired around bounded channels:
//!
//! - **Extractor** ([`dump_parser`]) — one per dump file, streams
//!   `<page>`/`<revision>`/`<logitem>` elements out of a (possibly
//!   `7z`/`gzip`/`bzip2`-compressed, see [`decompress`]) XML dump without
//!   buffering the whole file.
//! - **Transformer** ([`transform`]) — N workers per record stream, turn a
//!   parsed record into a tab-delimited row (and, for revisions, an
//!   optional search document), consulting [`identity`] to resolve the
//!   contributor and [`clean`]/[`patterns`] to clean markup and detect
//!   FA/FLIST/GA status.
//! - **Loader** ([`loader`]) — one per sink, accumulates rows/documents and
//!   issues a single bulk-ingest call per batch, retrying once before
//!   quarantining a batch that still fails.
//!
//! [`pipeline`] wires these together for a single dump file and drains a
//! shared work queue across many dump files; [`finalizer`] flushes the
//! identity map once per language after every dump file for that language
//! has been processed.
//!
//! ### Minimal usage
//!
//! ```no_run
//! use wikidump_etl::dump_parser::DumpKind;
//! use wikidump_etl::identity::{IdentityMap, NullCache};
//! use wikidump_etl::loader::{LoggingRelationalSink, LoggingSearchSink};
//! use wikidump_etl::patterns::PatternRegistry;
//! use wikidump_etl::pipeline::{self, Config, DumpSinks};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let identity_map = IdentityMap::new();
//!     let cache = NullCache;
//!     let registry = PatternRegistry::builtin();
//!     let lang_patterns = registry.for_language("enwiki")?;
//!
//!     let sinks = DumpSinks {
//!         page: LoggingRelationalSink::default(),
//!         revision: LoggingRelationalSink::default(),
//!         logitem: LoggingRelationalSink::default(),
//!         search: LoggingSearchSink::default(),
//!     };
//!
//!     pipeline::run_dump(
//!         "enwiki-20240901-pages-meta-history.xml.bz2".as_ref(),
//!         "enwiki",
//!         DumpKind::RevisionHistory,
//!         &cfg,
//!         &identity_map,
//!         &cache,
//!         lang_patterns,
//!         sinks,
//!     )?;
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency model
//!
//! Realized with OS threads (`std::thread::scope`) and
//! `crossbeam_channel::bounded` channels for backpressure — no async
//! runtime. `Envelope::EndOfStream` sentinels propagate downstream once per
//! declared producer, so a loader knows exactly how many sentinels to count
//! before it is safe to flush the remainder and terminate. Contributor
//! identity lives in one process-wide [`identity::IdentityMap`], partitioned
//! internally and guarded by a `Mutex` per partition.
//!
//! ## Logging and error handling
//!
//! Every stage emits structured events through the `tracing` crate —
//! initialize a subscriber (e.g. `tracing_subscriber::fmt().init()`, filtered
//! by the `RUST_LOG` environment variable via the `env-filter` feature)
//! before running a dump. Errors are layered by the boundary at which they
//! are raised ([`error::ExtractionError`] aborts a dump, [`error::RecordError`]
//! is dropped by the transformer worker that raised it, [`error::LoadError`]
//! triggers the loader's retry-then-quarantine policy, [`error::CacheError`]
//! only degrades identity-map writes to best-effort).
//!
//! ## Features
//!
//! - `redis-cache` — enables [`identity::RedisCache`], a durable mirror of
//!   the identity map reachable over Redis, pooled with `r2d2`.
//! - `strict` — reserved for callers who want record-parsing failures to
//!   abort a dump instead of being dropped with a warning.

pub mod clean;
pub mod decompress;
pub mod dump_parser;
pub mod error;
pub mod finalizer;
pub mod identity;
pub mod loader;
pub mod patterns;
pub mod pipeline;
pub mod transform;
