use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use wikidump_etl::dump_parser::DumpKind;
use wikidump_etl::finalizer;
use wikidump_etl::identity::{IdentityCache, IdentityMap, NullCache};
use wikidump_etl::loader::{LoggingRelationalSink, LoggingSearchSink};
use wikidump_etl::patterns::PatternRegistry;
use wikidump_etl::pipeline::{self, Config, DumpSinks};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DumpKindArg {
    RevisionHistory,
    StubMeta,
    Logging,
}

impl From<DumpKindArg> for DumpKind {
    fn from(value: DumpKindArg) -> Self {
        match value {
            DumpKindArg::RevisionHistory => DumpKind::RevisionHistory,
            DumpKindArg::StubMeta => DumpKind::StubMeta,
            DumpKindArg::Logging => DumpKind::Logging,
        }
    }
}

/// Thin driver around the orchestrator: takes a single dump file, runs it
/// to completion, and finalizes the identity map for its language. Fanning
/// this out across many dump files/languages is a deployment concern (a
/// shell loop, a job scheduler) layered on top of this binary, not
/// something the binary itself needs to own.
#[derive(Debug, Parser)]
#[command(name = "wikidump-etl", version, about)]
struct CommandLine {
    /// Path to the (optionally compressed) dump file.
    #[arg(env = "WIKIDUMP_ETL_PATH")]
    path: PathBuf,

    /// Wiki database name, e.g. "enwiki", used for pattern lookup and as
    /// the cache/search-index namespace.
    #[arg(env = "WIKIDUMP_ETL_LANG")]
    lang: String,

    /// Which dump variant `path` is.
    #[arg(value_enum, env = "WIKIDUMP_ETL_KIND", default_value = "revision-history")]
    kind: DumpKindArg,

    #[arg(long, env = "WIKIDUMP_ETL_PAGE_FAN", default_value_t = Config::default().page_fan)]
    page_fan: usize,
    #[arg(long, env = "WIKIDUMP_ETL_REV_FAN", default_value_t = Config::default().rev_fan)]
    rev_fan: usize,
    #[arg(long, env = "WIKIDUMP_ETL_LOG_FAN", default_value_t = Config::default().log_fan)]
    log_fan: usize,
    #[arg(long, env = "WIKIDUMP_ETL_CHANNEL_CAPACITY", default_value_t = Config::default().channel_capacity)]
    channel_capacity: usize,
    #[arg(long, env = "WIKIDUMP_ETL_BATCH_ROWS", default_value_t = Config::default().batch_rows)]
    batch_rows: usize,
    #[arg(long, env = "WIKIDUMP_ETL_BATCH_DOCS", default_value_t = Config::default().batch_docs)]
    batch_docs: usize,
    #[arg(long, env = "WIKIDUMP_ETL_STAGING_DIR")]
    staging_dir: Option<PathBuf>,
    #[arg(long, env = "WIKIDUMP_ETL_QUARANTINE_DIR")]
    quarantine_dir: Option<PathBuf>,

    /// Optional language-pattern overrides, layered on top of the built-in
    /// registry (spec.md §6).
    #[arg(long, env = "WIKIDUMP_ETL_PATTERNS_FILE")]
    patterns_file: Option<PathBuf>,

    /// Connect to Redis for a durable identity-map mirror instead of the
    /// in-memory-only fallback. Requires the `redis-cache` feature.
    #[cfg(feature = "redis-cache")]
    #[arg(long, env = "WIKIDUMP_ETL_REDIS_URL")]
    redis_url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = CommandLine::parse();

    let mut cfg = Config {
        page_fan: args.page_fan,
        rev_fan: args.rev_fan,
        log_fan: args.log_fan,
        channel_capacity: args.channel_capacity,
        batch_rows: args.batch_rows,
        batch_docs: args.batch_docs,
        ..Config::default()
    };
    if let Some(dir) = args.staging_dir {
        cfg.staging_dir = dir;
    }
    if let Some(dir) = args.quarantine_dir {
        cfg.quarantine_dir = dir;
    }

    let owned_registry;
    let registry: &PatternRegistry = match &args.patterns_file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            owned_registry = PatternRegistry::load_toml(&contents)?;
            &owned_registry
        }
        None => PatternRegistry::builtin(),
    };
    let lang_patterns = registry.for_language(&args.lang)?;

    let identity_map = IdentityMap::new();

    #[cfg(feature = "redis-cache")]
    let cache_storage: Box<dyn IdentityCache> = match args.redis_url {
        Some(url) => Box::new(wikidump_etl::identity::RedisCache::connect(&url)?),
        None => Box::new(NullCache),
    };
    #[cfg(not(feature = "redis-cache"))]
    let cache_storage: Box<dyn IdentityCache> = Box::new(NullCache);

    let sinks = DumpSinks {
        page: LoggingRelationalSink::default(),
        revision: LoggingRelationalSink::default(),
        logitem: LoggingRelationalSink::default(),
        search: LoggingSearchSink::default(),
    };

    pipeline::run_dump(
        &args.path,
        &args.lang,
        args.kind.into(),
        &cfg,
        &identity_map,
        cache_storage.as_ref(),
        lang_patterns,
        sinks,
    )?;

    let mut finalize_sink = LoggingRelationalSink::default();
    finalizer::finalize_language(
        &identity_map,
        cache_storage.as_ref(),
        args.lang.as_str(),
        &cfg.staging_dir,
        &mut finalize_sink,
    )?;

    Ok(())
}
