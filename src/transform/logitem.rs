//! Log-Item Transformer (spec.md §4.4): timestamp normalization and
//! contributor resolution identical to the revision transformer's step 4.

use crate::dump_parser::LogItemRecord;
use crate::error::RecordError;
use crate::identity::{escape_field, IdentityService};

use super::{normalize_timestamp, TabRow};

/// Column order: `log_id, log_type, action, timestamp, user, target_title,
/// params, comment`.
pub fn transform_logitem(item: &LogItemRecord, identity: &IdentityService) -> Result<TabRow, RecordError> {
    if item.timestamp.is_empty() {
        return Err(RecordError::MalformedTimestamp(item.timestamp.to_string()));
    }

    let user = identity.resolve(item.log_id, &item.performer);
    let timestamp = normalize_timestamp(&item.timestamp);
    let params = item
        .params
        .as_deref()
        .map(escape_field)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "NULL".to_string());
    let comment = item
        .comment
        .as_deref()
        .map(escape_field)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "NULL".to_string());

    Ok(format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        item.log_id,
        escape_field(&item.log_type),
        escape_field(&item.action),
        timestamp,
        user,
        escape_field(&item.target_title),
        params,
        comment,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Contributor, IdentityMap, NullCache};

    #[test]
    fn anonymous_log_item_yields_user_zero() {
        let map = IdentityMap::new();
        let cache = NullCache;
        let identity = IdentityService::new(&map, &cache, "enwiki");
        let item = LogItemRecord {
            log_id: 1,
            log_type: "delete".into(),
            action: "delete".into(),
            timestamp: "2020-01-02T03:04:05Z".into(),
            performer: Contributor::Anonymous {
                ip: "192.168.0.1".parse().unwrap(),
            },
            target_title: "Some Page".into(),
            params: None,
            comment: Some("bye".into()),
        };

        let row = transform_logitem(&item, &identity).unwrap();
        let cols: Vec<_> = row.split('\t').collect();
        assert_eq!(cols[4], "0");
        assert_eq!(cols[3], "2020-01-02 03:04:05");
    }

    #[test]
    fn missing_params_render_as_null() {
        let map = IdentityMap::new();
        let cache = NullCache;
        let identity = IdentityService::new(&map, &cache, "enwiki");
        let item = LogItemRecord {
            log_id: 2,
            log_type: "move".into(),
            action: "move".into(),
            timestamp: "2020-01-01T00:00:00Z".into(),
            performer: Contributor::Absent,
            target_title: "Page".into(),
            params: None,
            comment: None,
        };
        let row = transform_logitem(&item, &identity).unwrap();
        assert!(row.ends_with("NULL\tNULL"));
    }
}
