//! Shared contributor-identity resolution (spec.md §3 IdentityMap, §4.5
//! IdentityService, §5 concurrency).
//!
//! The map is process-wide and language-partitioned. Each partition is
//! guarded by its own `Mutex` — spec.md §5: "a simple mutex per partition
//! suffices, as write rates are modest relative to parse throughput."

use std::net::IpAddr;
use std::sync::Mutex;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use crate::error::CacheError;

/// Packs an IP address into the numeric representation spec.md §4.5
/// describes (IPv4 → 32-bit, IPv6 → 128-bit).
pub fn pack_ip(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// One partition of the map: user-id → username, first-non-empty-wins.
#[derive(Debug, Default)]
struct UserPartition {
    users: FxHashMap<i64, CompactString>,
}

impl UserPartition {
    /// spec.md §4.5 `recordUser`: non-nil username always overwrites
    /// (last-writer-wins among non-empty values); a nil username only
    /// writes the empty string when no prior entry exists at all
    /// (first-writer-wins for the "unknown" placeholder).
    fn record(&mut self, user_id: i64, username: Option<&str>) {
        match username {
            Some(name) => {
                self.users.insert(user_id, name.into());
            }
            None => {
                self.users.entry(user_id).or_insert_with(CompactString::default);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct IdentityMap {
    users: Mutex<UserPartition>,
    anon_revs: Mutex<FxHashMap<i64, u128>>,
    users_zero: Mutex<FxHashMap<i64, CompactString>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_anon(&self, rev_id: i64, ip: u128) {
        self.anon_revs.lock().unwrap().insert(rev_id, ip);
    }

    fn record_missing(&self, rev_id: i64, username: &str) {
        self.users_zero
            .lock()
            .unwrap()
            .insert(rev_id, username.into());
    }

    fn record_user(&self, user_id: i64, username: Option<&str>) {
        self.users.lock().unwrap().record(user_id, username);
    }

    pub(crate) fn snapshot_users(&self) -> Vec<(i64, CompactString)> {
        self.users
            .lock()
            .unwrap()
            .users
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect()
    }

    pub(crate) fn snapshot_anon_revs(&self) -> Vec<(i64, u128)> {
        self.anon_revs
            .lock()
            .unwrap()
            .iter()
            .map(|(rev, ip)| (*rev, *ip))
            .collect()
    }

    pub(crate) fn snapshot_users_zero(&self) -> Vec<(i64, CompactString)> {
        self.users_zero
            .lock()
            .unwrap()
            .iter()
            .map(|(rev, name)| (*rev, name.clone()))
            .collect()
    }
}

/// Durable scratch for the identity map, reachable over a local socket
/// (spec.md §6). The in-memory map above is always authoritative for the
/// current process; a cache implementation additionally mirrors writes so
/// they survive across dump files within the same language run.
pub trait IdentityCache: Send + Sync {
    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError>;
    fn hscan(&self, key: &str) -> Result<Vec<(String, String)>, CacheError>;
}

/// Single-language-run fallback per spec.md §9: "an in-memory fallback is
/// acceptable for single-language runs."
#[derive(Debug, Default)]
pub struct NullCache;

impl IdentityCache for NullCache {
    fn hset(&self, _key: &str, _field: &str, _value: &str) -> Result<(), CacheError> {
        Ok(())
    }

    fn hscan(&self, _key: &str) -> Result<Vec<(String, String)>, CacheError> {
        Ok(Vec::new())
    }
}

#[cfg(feature = "redis-cache")]
pub struct RedisCache {
    pool: r2d2::Pool<redis::Client>,
}

#[cfg(feature = "redis-cache")]
impl RedisCache {
    pub fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Unreachable(e.to_string()))?;
        let pool = r2d2::Pool::builder()
            .build(client)
            .map_err(|e| CacheError::Unreachable(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[cfg(feature = "redis-cache")]
impl IdentityCache for RedisCache {
    fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        use redis::Commands;
        let mut conn = self
            .pool
            .get()
            .map_err(|e| CacheError::Unreachable(e.to_string()))?;
        conn.hset(key, field, value)
            .map_err(|e| CacheError::Unreachable(e.to_string()))
    }

    fn hscan(&self, key: &str) -> Result<Vec<(String, String)>, CacheError> {
        use redis::Commands;
        let mut conn = self
            .pool
            .get()
            .map_err(|e| CacheError::Unreachable(e.to_string()))?;
        conn.hgetall(key)
            .map_err(|e| CacheError::Unreachable(e.to_string()))
    }
}

/// Resolved user column for a revision or log-item row (spec.md §4.3
/// step 4).
pub const USER_ANONYMOUS: i64 = 0;
pub const USER_ABSENT: i64 = -1;
pub const USER_MISSING_ID: i64 = -2;

/// The four-case tagged Contributor (spec.md §3, §9).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Contributor {
    Anonymous { ip: IpAddr },
    Registered { user_id: i64, username: Option<CompactString> },
    MissingId { username: CompactString },
    Absent,
}

/// Exposes the four IdentityService operations against a shared
/// [`IdentityMap`] plus an optional durable [`IdentityCache`] mirror
/// (spec.md §4.5).
pub struct IdentityService<'a> {
    map: &'a IdentityMap,
    cache: &'a dyn IdentityCache,
    lang: CompactString,
}

impl<'a> IdentityService<'a> {
    pub fn new(map: &'a IdentityMap, cache: &'a dyn IdentityCache, lang: impl Into<CompactString>) -> Self {
        Self {
            map,
            cache,
            lang: lang.into(),
        }
    }

    /// Resolves a contributor, returning the numeric user column per
    /// spec.md §4.3 step 4, and mirrors the write into the shared map
    /// (and, best-effort, the durable cache).
    pub fn resolve(&self, rev_id: i64, contributor: &Contributor) -> i64 {
        match contributor {
            Contributor::Anonymous { ip } => {
                let packed = pack_ip(*ip);
                self.map.record_anon(rev_id, packed);
                if let Err(e) = self
                    .cache
                    .hset(&format!("{}:revsanon", self.lang), &rev_id.to_string(), &packed.to_string())
                {
                    tracing::warn!(message = "identity cache degraded, anon IP write is best-effort only", error = %e);
                }
                USER_ANONYMOUS
            }
            Contributor::Registered { user_id, username } => {
                self.map.record_user(*user_id, username.as_deref());
                if let Some(name) = username {
                    if let Err(e) = self.cache.hset(
                        &format!("{}:users", self.lang),
                        &user_id.to_string(),
                        name.as_str(),
                    ) {
                        tracing::warn!(message = "identity cache degraded, user write is best-effort only", error = %e);
                    }
                }
                *user_id
            }
            Contributor::MissingId { username } => {
                self.map.record_missing(rev_id, username);
                if let Err(e) = self.cache.hset(
                    &format!("{}:userzero", self.lang),
                    &rev_id.to_string(),
                    username.as_str(),
                ) {
                    tracing::warn!(message = "identity cache degraded, missing-id write is best-effort only", error = %e);
                }
                USER_MISSING_ID
            }
            Contributor::Absent => USER_ABSENT,
        }
    }

    /// spec.md §4.5 `finalize`: inserts the three special rows, then
    /// bulk-loads each partition into the relational store. `sink` receives
    /// `(table_name, rows)` where each row is already tab-delimited.
    pub fn finalize(&self, sink: &mut dyn FnMut(&str, Vec<String>)) {
        self.map.record_user(USER_ANONYMOUS, Some("Anonymous user"));
        self.map.record_user(USER_ABSENT, Some("NA"));
        self.map.record_user(USER_MISSING_ID, Some("Missing ID"));

        let user_rows = self
            .map
            .snapshot_users()
            .into_iter()
            .map(|(id, name)| format!("{}\t{}", id, escape_field(&name)))
            .collect();
        sink("user", user_rows);

        let anon_rows = self
            .map
            .snapshot_anon_revs()
            .into_iter()
            .map(|(rev, ip)| format!("{}\t{}", rev, ip))
            .collect();
        sink("revision_IP", anon_rows);

        let zero_rows = self
            .map
            .snapshot_users_zero()
            .into_iter()
            .map(|(rev, name)| format!("{}\t{}", rev, escape_field(&name)))
            .collect();
        sink("revision_user_zero", zero_rows);
    }
}

/// Tab-delimited field escaping shared by every loader: doubles embedded
/// quotes and backslashes per the relational bulk-load dialect (spec.md
/// §4.2, §4.6), matching `revision.py`'s
/// `.replace("\\","\\\\").replace('"','\\"')` escaping.
pub fn escape_field(value: &str) -> CompactString {
    if !value.contains('"') && !value.contains('\\') {
        return value.into();
    }
    let mut out = String::with_capacity(value.len() + 4);
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_revision_yields_user_zero_and_stores_packed_ip() {
        let map = IdentityMap::new();
        let cache = NullCache;
        let svc = IdentityService::new(&map, &cache, "enwiki");
        let contributor = Contributor::Anonymous {
            ip: "10.0.0.1".parse().unwrap(),
        };
        let user = svc.resolve(100, &contributor);
        assert_eq!(user, USER_ANONYMOUS);
        assert_eq!(map.snapshot_anon_revs(), vec![(100, 167_772_161)]);
    }

    #[test]
    fn missing_id_user_yields_minus_two_and_records_username() {
        let map = IdentityMap::new();
        let cache = NullCache;
        let svc = IdentityService::new(&map, &cache, "enwiki");
        let contributor = Contributor::MissingId {
            username: "Bob".into(),
        };
        let user = svc.resolve(42, &contributor);
        assert_eq!(user, USER_MISSING_ID);
        assert_eq!(
            map.snapshot_users_zero(),
            vec![(42, CompactString::from("Bob"))]
        );
    }

    #[test]
    fn absent_contributor_yields_minus_one() {
        let map = IdentityMap::new();
        let cache = NullCache;
        let svc = IdentityService::new(&map, &cache, "enwiki");
        assert_eq!(svc.resolve(7, &Contributor::Absent), USER_ABSENT);
    }

    #[test]
    fn first_writer_wins_for_empty_username_last_writer_wins_for_non_empty() {
        let map = IdentityMap::new();
        map.record_user(5, None);
        map.record_user(5, None);
        assert_eq!(map.snapshot_users(), vec![(5, CompactString::default())]);

        map.record_user(5, Some("Alice"));
        assert_eq!(
            map.snapshot_users(),
            vec![(5, CompactString::from("Alice"))]
        );

        // A later nil write must not clobber the now-known username.
        map.record_user(5, None);
        assert_eq!(
            map.snapshot_users(),
            vec![(5, CompactString::from("Alice"))]
        );
    }

    #[test]
    fn escape_field_doubles_quotes_and_backslashes() {
        assert_eq!(escape_field(r#"he said "hi""#).as_str(), r#"he said \"hi\""#);
        assert_eq!(escape_field(r"a\b").as_str(), r"a\\b");
        assert_eq!(escape_field("plain").as_str(), "plain");
    }

    proptest::proptest! {
        /// Escaping never removes characters and only ever inserts a
        /// backslash immediately before a quote or backslash.
        #[test]
        fn escape_field_never_shrinks(s in ".*") {
            let escaped = escape_field(&s);
            proptest::prop_assert!(escaped.len() >= s.len());
        }

        /// Anonymous resolution is deterministic: resolving the same
        /// (rev_id, ip) pair twice records the same packed value both
        /// times.
        #[test]
        fn anonymous_resolution_is_deterministic(rev_id in 1i64..1_000_000, octets in proptest::array::uniform4(0u8..=255)) {
            let map = IdentityMap::new();
            let cache = NullCache;
            let svc = IdentityService::new(&map, &cache, "enwiki");
            let ip = IpAddr::from(octets);
            svc.resolve(rev_id, &Contributor::Anonymous { ip });
            let first = map.snapshot_anon_revs();
            svc.resolve(rev_id, &Contributor::Anonymous { ip });
            let second = map.snapshot_anon_revs();
            proptest::prop_assert_eq!(first, second);
        }
    }
}
