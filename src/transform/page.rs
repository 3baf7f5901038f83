//! Page Transformer (spec.md §4.2).

use crate::dump_parser::PageRecord;
use crate::identity::escape_field;

use super::TabRow;

/// Column order: `page_id, namespace, title, redirect_target, restrictions`.
/// Optional fields are emitted as the literal `NULL`, matching the other
/// transformers' treatment of absent columns.
pub fn transform_page(page: &PageRecord) -> TabRow {
    let redirect = page
        .redirect_target
        .as_deref()
        .map(escape_field)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "NULL".to_string());
    let restrictions = page
        .restrictions
        .as_deref()
        .map(escape_field)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "NULL".to_string());

    format!(
        "{}\t{}\t{}\t{}\t{}",
        page.page_id,
        page.namespace,
        escape_field(&page.title),
        redirect,
        restrictions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_a_plain_page_row() {
        let page = PageRecord {
            page_id: 5,
            namespace: 0,
            title: "Example".into(),
            redirect_target: None,
            restrictions: None,
        };
        assert_eq!(transform_page(&page), "5\t0\tExample\tNULL\tNULL");
    }

    #[test]
    fn escapes_quotes_and_backslashes_in_the_title() {
        let page = PageRecord {
            page_id: 1,
            namespace: 0,
            title: r#"Say "hi" \ bye"#.into(),
            redirect_target: Some("Other".into()),
            restrictions: None,
        };
        let row = transform_page(&page);
        assert!(row.contains(r#"Say \"hi\" \\ bye"#));
        assert!(row.ends_with("\tOther\tNULL"));
    }
}
