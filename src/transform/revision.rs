//! Revision Transformer (spec.md §4.3).

use crate::clean;
use crate::dump_parser::RevisionRecord;
use crate::error::RecordError;
use crate::identity::{escape_field, IdentityService};
use crate::patterns::LanguagePatterns;

use super::{normalize_timestamp, SearchDoc, TabRow};

/// Column order: `rev_id, page_id, parent_id, timestamp, text_length,
/// is_minor, is_redirect, is_fa, is_flist, is_ga, user, comment,
/// content_hash`.
pub fn transform_revision(
    rev: &RevisionRecord,
    patterns: &LanguagePatterns,
    identity: &IdentityService,
) -> Result<(TabRow, Option<SearchDoc>), RecordError> {
    if rev.timestamp.is_empty() {
        return Err(RecordError::MalformedTimestamp(rev.timestamp.to_string()));
    }

    let raw_text = rev.text.as_deref();
    let cleaned = raw_text.map(clean::clean_markup).unwrap_or_default();
    let text_length = raw_text.map(clean::text_length).unwrap_or(0);
    let is_redirect = raw_text.is_some_and(clean::is_redirect);

    // Pattern detection runs against the *raw* wikitext: `clean_markup`
    // strips `{{...}}` templates entirely, which is exactly what the FA/
    // FLIST/GA markers live inside.
    let (is_fa, is_flist, is_ga) = if rev.namespace == 0 {
        let probe = raw_text.unwrap_or("");
        (
            patterns.is_featured_article(probe),
            patterns.is_featured_list(probe),
            patterns.is_good_article(probe),
        )
    } else {
        (false, false, false)
    };

    let user = identity.resolve(rev.rev_id, &rev.contributor);
    let timestamp = normalize_timestamp(&rev.timestamp);
    let parent_id = rev.parent_rev_id.unwrap_or(-1);
    let comment_field = rev
        .comment
        .as_deref()
        .map(escape_field)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "NULL".to_string());

    let row = format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        rev.rev_id,
        rev.page_id,
        parent_id,
        timestamp,
        text_length,
        rev.is_minor as u8,
        is_redirect as u8,
        is_fa as u8,
        is_flist as u8,
        is_ga as u8,
        user,
        comment_field,
        escape_field(&cleaned),
    );

    let search_doc = if is_redirect {
        None
    } else {
        Some(SearchDoc {
            rev_id: rev.rev_id,
            timestamp,
            parent_id,
            page_id: rev.page_id,
            comment: rev
                .comment
                .clone()
                .unwrap_or_else(|| compact_str::CompactString::from("NULL")),
            text: cleaned.to_string(),
        })
    };

    Ok((row, search_doc))
}
