//! Lightweight wikitext-to-plaintext reduction (spec.md §4.3 step 1).
//!
//! Three deterministic reductions, applied in order: template removal,
//! link simplification, HTML tag stripping. `revision.py`
//! (`examples/original_source/WikiDAT/wikidat/retrieval/revision.py`)
//! delegates this to `wikiextractor.clean.clean_markup`; reimplemented
//! here with `regex` since no wikitext-AST crate is available.
//!
//! NOTE: spec.md §9 records an open question — `revision.py` stores the
//! cleaned text itself as the "content hash" (variable name `text_hash`).
//! That behavior is preserved as-is below; `content_hash` is *not* a
//! cryptographic digest.

use std::sync::OnceLock;

use compact_str::CompactString;
use regex::Regex;

fn template_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{[^{}]*\}\}").unwrap())
}

fn link_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[(?:[^\[\]|]*\|)?([^\[\]]*)\]\]").unwrap())
}

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

/// Strips wiki markup from `raw`, repeating template removal until no
/// further (possibly nested, up to the non-nested-bracket pattern's
/// reach) templates remain, then simplifying `[[target|label]]` links to
/// their label and stripping HTML tags.
///
/// Re-running this function on already-cleaned text is the identity
/// (spec.md §8): none of the three passes matches plain text.
pub fn clean_markup(raw: &str) -> CompactString {
    let mut text = raw.to_string();

    loop {
        let replaced = template_pattern().replace_all(&text, "").into_owned();
        if replaced == text {
            break;
        }
        text = replaced;
    }

    let text = link_pattern().replace_all(&text, "$1").into_owned();
    let text = tag_pattern().replace_all(&text, "").into_owned();

    text.into()
}

/// spec.md §4.3 step 1: `text-length` is the byte length of the cleaned
/// text.
pub fn text_length(cleaned: &str) -> usize {
    cleaned.len()
}

/// spec.md §4.3 step 2: redirect iff the raw text's first 9 bytes equal
/// `#REDIRECT`, case-insensitive, byte offset 0.
pub fn is_redirect(raw: &str) -> bool {
    let prefix = raw.as_bytes().get(..9);
    matches!(prefix, Some(p) if p.eq_ignore_ascii_case(b"#REDIRECT"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_templates_links_and_tags() {
        let raw = "Hello {{infobox|x=1}} [[Target|label]] <b>world</b>";
        assert_eq!(clean_markup(raw).as_str(), "Hello  label world");
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(clean_markup("just plain text").as_str(), "just plain text");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let raw = "{{tmpl}} [[A|B]] <i>C</i>";
        let once = clean_markup(raw);
        let twice = clean_markup(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn redirect_detection_is_case_insensitive_prefix_only() {
        assert!(is_redirect("#REDIRECT [[Target]]"));
        assert!(is_redirect("#redirect [[target]]"));
        assert!(!is_redirect("See #REDIRECT inline")); // not a prefix
        assert!(!is_redirect("short"));
    }

    #[test]
    fn text_length_is_cleaned_byte_length() {
        let cleaned = clean_markup("{{x}}abc");
        assert_eq!(text_length(&cleaned), 3);
    }
}
