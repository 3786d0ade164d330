//! Persistence for cached matches and ISRC cross-references.
//!
//! The resolver only depends on the `MatchStore` trait; `SqliteStore` is the
//! rusqlite-backed implementation used by the binaries and the tests.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;

use crate::comparison::MatchTier;
use crate::criteria::MatchCriteria;
use crate::error::Result;
use crate::models::{CachedMatch, IsrcCrossReference, ProviderTrackKey};

// ============================================================================
// Store Contract
// ============================================================================

/// Filter for reading ISRC cross-references.
///
/// Every set condition becomes one clause; `logical_and` joins them with AND,
/// otherwise OR. With no condition set, every row is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsrcFilter {
    pub isrc: Option<String>,
    /// `Some(true)`: at least one id list non-empty. `Some(false)`: placeholders only.
    pub has_any_ids_set: Option<bool>,
    pub min_last_checked: Option<DateTime<Utc>>,
    pub max_last_checked: Option<DateTime<Utc>>,
    pub logical_and: bool,
}

impl Default for IsrcFilter {
    fn default() -> Self {
        Self {
            isrc: None,
            has_any_ids_set: None,
            min_last_checked: None,
            max_last_checked: None,
            logical_and: true,
        }
    }
}

/// Head row of an ISRC cross-reference, without its catalog ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsrcCheck {
    pub id: i64,
    pub isrc: String,
    pub last_checked: DateTime<Utc>,
}

pub trait MatchStore {
    fn get_cached_matches(&self, key: &ProviderTrackKey) -> Result<Vec<CachedMatch>>;

    /// Insert a new cached match row. Existing rows are never updated.
    fn insert_cached_match(&self, key: &ProviderTrackKey, cached: &CachedMatch) -> Result<i64>;

    fn get_isrc_mappings(&self, filter: &IsrcFilter) -> Result<Vec<IsrcCrossReference>>;

    /// Like `get_isrc_mappings`, but only the head rows.
    fn get_isrc_checks(&self, filter: &IsrcFilter) -> Result<Vec<IsrcCheck>>;

    /// Insert or refresh the record for `mapping.isrc`, adding its ids.
    fn upsert_isrc_mapping(&self, mapping: &IsrcCrossReference) -> Result<i64>;

    /// Delete records by id. True if every id was removed.
    fn delete_isrc_mappings(&self, ids: &[i64]) -> Result<bool>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS provider_tracks (
        id INTEGER PRIMARY KEY,
        provider_id TEXT NOT NULL,
        track_id TEXT NOT NULL,
        UNIQUE (provider_id, track_id)
    );
    CREATE TABLE IF NOT EXISTS provider_track_matches (
        id INTEGER PRIMARY KEY,
        provider_track_id INTEGER NOT NULL REFERENCES provider_tracks(id) ON DELETE CASCADE,
        library_track_id TEXT NOT NULL,
        tier INTEGER NOT NULL,
        criteria INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_matches_provider_track
        ON provider_track_matches(provider_track_id);
    CREATE TABLE IF NOT EXISTS isrc_checks (
        id INTEGER PRIMARY KEY,
        isrc TEXT NOT NULL UNIQUE,
        last_checked INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS isrc_recordings (
        isrc TEXT NOT NULL REFERENCES isrc_checks(isrc) ON DELETE CASCADE,
        recording_id TEXT NOT NULL,
        UNIQUE (isrc, recording_id)
    );
    CREATE TABLE IF NOT EXISTS isrc_releases (
        isrc TEXT NOT NULL REFERENCES isrc_checks(isrc) ON DELETE CASCADE,
        release_id TEXT NOT NULL DEFAULT '',
        track_id TEXT NOT NULL DEFAULT '',
        UNIQUE (isrc, release_id, track_id)
    );
    CREATE TABLE IF NOT EXISTS isrc_release_groups (
        isrc TEXT NOT NULL REFERENCES isrc_checks(isrc) ON DELETE CASCADE,
        release_group_id TEXT NOT NULL,
        UNIQUE (isrc, release_group_id)
    );
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Row id of a provider track, inserting it on first use.
    pub fn provider_track_id(&self, key: &ProviderTrackKey) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO provider_tracks (provider_id, track_id) VALUES (?1, ?2)",
            params![key.provider_id, key.track_id],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM provider_tracks WHERE provider_id = ?1 AND track_id = ?2",
            params![key.provider_id, key.track_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn load_ids(&self, sql: &str, isrc: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![isrc], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for id in rows {
            let id = id?;
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

impl MatchStore for SqliteStore {
    fn get_cached_matches(&self, key: &ProviderTrackKey) -> Result<Vec<CachedMatch>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT m.id, m.library_track_id, m.tier, m.criteria
             FROM provider_track_matches m
             JOIN provider_tracks p ON p.id = m.provider_track_id
             WHERE p.provider_id = ?1 AND p.track_id = ?2
             ORDER BY m.id",
        )?;
        let rows = stmt.query_map(params![key.provider_id, key.track_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (id, library_track_id, tier, criteria) = row?;
            let Some(tier) = MatchTier::from_i64(tier) else {
                log::warn!("Skipping cached match {} with unknown tier {}", id, tier);
                continue;
            };
            matches.push(CachedMatch {
                id: Some(id),
                library_track_id,
                tier,
                criteria: MatchCriteria::from_bits_truncate(criteria as u8),
            });
        }
        Ok(matches)
    }

    fn insert_cached_match(&self, key: &ProviderTrackKey, cached: &CachedMatch) -> Result<i64> {
        let provider_track_id = self.provider_track_id(key)?;
        self.conn.execute(
            "INSERT INTO provider_track_matches (provider_track_id, library_track_id, tier, criteria)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                provider_track_id,
                cached.library_track_id,
                cached.tier.as_i64(),
                cached.criteria.bits() as i64
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_isrc_mappings(&self, filter: &IsrcFilter) -> Result<Vec<IsrcCrossReference>> {
        let mut mappings = Vec::new();
        for check in self.get_isrc_checks(filter)? {
            let isrc = check.isrc;
            mappings.push(IsrcCrossReference {
                id: Some(check.id),
                recording_ids: self
                    .load_ids("SELECT recording_id FROM isrc_recordings WHERE isrc = ?1", &isrc)?,
                release_ids: self
                    .load_ids("SELECT release_id FROM isrc_releases WHERE isrc = ?1", &isrc)?,
                track_ids: self
                    .load_ids("SELECT track_id FROM isrc_releases WHERE isrc = ?1", &isrc)?,
                release_group_ids: self.load_ids(
                    "SELECT release_group_id FROM isrc_release_groups WHERE isrc = ?1",
                    &isrc,
                )?,
                last_checked: check.last_checked,
                isrc,
            });
        }
        Ok(mappings)
    }

    fn get_isrc_checks(&self, filter: &IsrcFilter) -> Result<Vec<IsrcCheck>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(isrc) = &filter.isrc {
            clauses.push("c.isrc = ?".to_string());
            values.push(Value::Text(isrc.clone()));
        }
        if let Some(has_ids) = filter.has_any_ids_set {
            let exists = [
                "EXISTS (SELECT 1 FROM isrc_recordings r WHERE r.isrc = c.isrc)",
                "EXISTS (SELECT 1 FROM isrc_releases r WHERE r.isrc = c.isrc)",
                "EXISTS (SELECT 1 FROM isrc_release_groups r WHERE r.isrc = c.isrc)",
            ];
            let clause = if has_ids {
                exists.join(" OR ")
            } else {
                exists
                    .iter()
                    .map(|e| format!("NOT {}", e))
                    .collect::<Vec<_>>()
                    .join(" AND ")
            };
            clauses.push(format!("({})", clause));
        }
        if let Some(min) = filter.min_last_checked {
            clauses.push("c.last_checked >= ?".to_string());
            values.push(Value::Integer(to_millis(min)));
        }
        if let Some(max) = filter.max_last_checked {
            clauses.push("c.last_checked <= ?".to_string());
            values.push(Value::Integer(to_millis(max)));
        }

        let mut sql = "SELECT c.id, c.isrc, c.last_checked FROM isrc_checks c".to_string();
        if !clauses.is_empty() {
            let op = if filter.logical_and { " AND " } else { " OR " };
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(op));
        }
        sql.push_str(" ORDER BY c.id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok(IsrcCheck {
                id: row.get(0)?,
                isrc: row.get(1)?,
                last_checked: from_millis(row.get(2)?),
            })
        })?;
        let checks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(checks)
    }

    fn upsert_isrc_mapping(&self, mapping: &IsrcCrossReference) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let id: i64 = tx.query_row(
            "INSERT INTO isrc_checks (isrc, last_checked) VALUES (?1, ?2)
             ON CONFLICT (isrc) DO UPDATE SET last_checked = excluded.last_checked
             RETURNING id",
            params![mapping.isrc, to_millis(mapping.last_checked)],
            |row| row.get(0),
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO isrc_recordings (isrc, recording_id) VALUES (?1, ?2)",
            )?;
            for recording in &mapping.recording_ids {
                stmt.execute(params![mapping.isrc, recording])?;
            }

            // releases and tracks are stored as pairs, position by position
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO isrc_releases (isrc, release_id, track_id) VALUES (?1, ?2, ?3)",
            )?;
            let pairs = mapping.release_ids.len().max(mapping.track_ids.len());
            for i in 0..pairs {
                let release = mapping.release_ids.get(i).map(String::as_str).unwrap_or("");
                let track = mapping.track_ids.get(i).map(String::as_str).unwrap_or("");
                stmt.execute(params![mapping.isrc, release, track])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO isrc_release_groups (isrc, release_group_id) VALUES (?1, ?2)",
            )?;
            for group in &mapping.release_group_ids {
                stmt.execute(params![mapping.isrc, group])?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    fn delete_isrc_mappings(&self, ids: &[i64]) -> Result<bool> {
        if ids.is_empty() {
            return Ok(true);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM isrc_checks WHERE id IN ({})", placeholders);
        let deleted = self.conn.execute(&sql, params_from_iter(ids.iter()))?;
        Ok(deleted == ids.len())
    }
}

/// Look up a single record regardless of placeholder state.
pub fn find_isrc_mapping(store: &dyn MatchStore, isrc: &str) -> Result<Option<IsrcCrossReference>> {
    let filter = IsrcFilter {
        isrc: Some(isrc.to_string()),
        ..Default::default()
    };
    Ok(store.get_isrc_mappings(&filter)?.into_iter().next())
}

impl SqliteStore {
    /// Number of cached match rows, for reporting.
    pub fn cached_match_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM provider_track_matches", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key() -> ProviderTrackKey {
        ProviderTrackKey::new("spotify", "track-1")
    }

    fn cached(id: &str, tier: MatchTier, criteria: MatchCriteria) -> CachedMatch {
        CachedMatch {
            id: None,
            library_track_id: id.to_string(),
            tier,
            criteria,
        }
    }

    fn mapping(isrc: &str, checked: DateTime<Utc>, release_groups: &[&str]) -> IsrcCrossReference {
        let mut m = IsrcCrossReference::placeholder(isrc, checked);
        m.release_group_ids = release_groups.iter().map(|s| s.to_string()).collect();
        m
    }

    #[test]
    fn test_cached_matches_insert_never_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_cached_match(&key(), &cached("a", MatchTier::Default, MatchCriteria::ALL))
            .unwrap();
        store
            .insert_cached_match(&key(), &cached("a", MatchTier::Fuzzy, MatchCriteria::TRACK_NAME))
            .unwrap();

        let rows = store.get_cached_matches(&key()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tier, MatchTier::Default);
        assert_eq!(rows[0].criteria, MatchCriteria::ALL);
        assert_eq!(rows[1].tier, MatchTier::Fuzzy);
        assert_eq!(store.cached_match_count().unwrap(), 2);
    }

    #[test]
    fn test_cached_matches_are_scoped_by_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_cached_match(&key(), &cached("a", MatchTier::Default, MatchCriteria::ALL))
            .unwrap();
        let other = ProviderTrackKey::new("spotify", "track-2");
        assert!(store.get_cached_matches(&other).unwrap().is_empty());
        assert_eq!(store.provider_track_id(&key()).unwrap(), store.provider_track_id(&key()).unwrap());
    }

    #[test]
    fn test_upsert_merges_ids_and_refreshes_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        let old = Utc::now() - Duration::days(3);
        let first = store.upsert_isrc_mapping(&mapping("X", old, &["rg1"])).unwrap();

        let mut second = mapping("X", Utc::now(), &["rg2"]);
        second.release_ids = vec!["rel1".to_string()];
        second.track_ids = vec!["trk1".to_string()];
        let again = store.upsert_isrc_mapping(&second).unwrap();
        assert_eq!(first, again);

        let row = find_isrc_mapping(&store, "X").unwrap().unwrap();
        assert_eq!(row.release_group_ids, vec!["rg1", "rg2"]);
        assert_eq!(row.release_ids, vec!["rel1"]);
        assert_eq!(row.track_ids, vec!["trk1"]);
        assert!(row.last_checked > old);
    }

    #[test]
    fn test_filter_done_and_overdue() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.upsert_isrc_mapping(&mapping("RESOLVED", now - Duration::days(90), &["rg"])).unwrap();
        store.upsert_isrc_mapping(&mapping("FRESH", now - Duration::days(1), &[])).unwrap();
        store.upsert_isrc_mapping(&mapping("STALE", now - Duration::days(30), &[])).unwrap();

        let cutoff = now - Duration::days(14);
        let done = store
            .get_isrc_checks(&IsrcFilter {
                has_any_ids_set: Some(true),
                min_last_checked: Some(cutoff),
                logical_and: false,
                ..Default::default()
            })
            .unwrap();
        let done: Vec<&str> = done.iter().map(|c| c.isrc.as_str()).collect();
        assert_eq!(done, vec!["RESOLVED", "FRESH"]);

        // the full read agrees with the head-only read
        let full = store
            .get_isrc_mappings(&IsrcFilter {
                has_any_ids_set: Some(true),
                min_last_checked: Some(cutoff),
                logical_and: false,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(full.len(), 2);
        assert_eq!(full[0].release_group_ids, vec!["rg"]);

        let overdue = store
            .get_isrc_mappings(&IsrcFilter {
                has_any_ids_set: Some(false),
                max_last_checked: Some(cutoff),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].isrc, "STALE");
        assert!(overdue[0].is_placeholder());
    }

    #[test]
    fn test_delete_cascades_to_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.upsert_isrc_mapping(&mapping("X", Utc::now(), &["rg"])).unwrap();
        assert!(store.delete_isrc_mappings(&[id]).unwrap());
        assert!(find_isrc_mapping(&store, "X").unwrap().is_none());

        // re-inserting the same code must not resurrect the old ids
        store.upsert_isrc_mapping(&IsrcCrossReference::placeholder("X", Utc::now())).unwrap();
        assert!(find_isrc_mapping(&store, "X").unwrap().unwrap().is_placeholder());
        assert!(store.delete_isrc_mappings(&[]).unwrap());
        assert!(!store.delete_isrc_mappings(&[9999]).unwrap());
    }
}
