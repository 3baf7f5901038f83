//! Per-language finalizer (spec.md §4.5 `finalize`): a standalone step run
//! once after every dump file for a language has been processed, not once
//! per dump file — matching `etl.py`'s separate `users_file_to_db` call
//! site, which runs after the whole `paths_queue` drains.

use crate::error::LoadError;
use crate::identity::{IdentityCache, IdentityMap, IdentityService};
use crate::loader::RelationalSink;

/// Flushes the `user`, `revision_IP`, and `revision_user_zero` partitions
/// into `sink`, one `bulk_ingest` call per table. Each partition is written
/// to a throwaway staging file first, matching the shape every other
/// loader in this crate uses, rather than inventing a second ingest path.
pub fn finalize_language(
    map: &IdentityMap,
    cache: &dyn IdentityCache,
    lang: &str,
    staging_dir: &std::path::Path,
    sink: &mut dyn RelationalSink,
) -> Result<(), LoadError> {
    let identity = IdentityService::new(map, cache, lang);
    let mut first_err = None;

    identity.finalize(&mut |table, rows| {
        if rows.is_empty() {
            return;
        }
        let staging_path = staging_dir.join(format!("{lang}-{table}.tsv"));
        if let Err(e) = write_and_ingest(sink, table, &staging_path, &rows) {
            tracing::error!(message = "finalizer bulk load failed", table, error = %e);
            if first_err.is_none() {
                first_err = Some(e);
            }
        }
    });

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn write_and_ingest(
    sink: &mut dyn RelationalSink,
    table: &str,
    staging_path: &std::path::Path,
    rows: &[String],
) -> Result<(), LoadError> {
    use std::io::Write;
    let mut file = std::fs::File::create(staging_path).map_err(|source| LoadError::BulkIngest {
        target: staging_path.display().to_string(),
        source,
    })?;
    for row in rows {
        writeln!(file, "{}", row).map_err(|source| LoadError::BulkIngest {
            target: staging_path.display().to_string(),
            source,
        })?;
    }
    drop(file);
    sink.bulk_ingest(table, staging_path)?;
    let _ = std::fs::remove_file(staging_path);
    Ok(())
}
