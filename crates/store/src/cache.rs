//! Derived-result cache with upload dependency tracking.
//!
//! Staleness policy lives with callers (thresholds differ per report);
//! the store keeps entries, timestamps and dependency lists.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::Value;

use crate::uploads::parse_timestamp;
use crate::{Store, StoreError};

/// One cached calculation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub result: Value,
    pub last_updated: DateTime<Utc>,
    pub depends_on_uploads: Vec<String>,
}

impl CacheEntry {
    /// Entry age as of `now`; callers compare against their threshold.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_updated
    }
}

impl Store {
    pub fn cache_get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT cache_key, result, last_updated, depends_on_uploads \
             FROM calc_cache WHERE cache_key = ?1",
        )?;
        let mut rows = stmt.query_and_then(params![key], entry_from_row)?;
        rows.next().transpose()
    }

    /// Upsert an entry, always refreshing `last_updated` to `now`.
    pub fn cache_set(
        &self,
        key: &str,
        result: &Value,
        depends_on_uploads: &[String],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO calc_cache (cache_key, result, last_updated, depends_on_uploads) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(cache_key) DO UPDATE SET \
                 result = excluded.result, \
                 last_updated = excluded.last_updated, \
                 depends_on_uploads = excluded.depends_on_uploads",
            params![
                key,
                serde_json::to_string(result)?,
                now.to_rfc3339(),
                serde_json::to_string(depends_on_uploads)?,
            ],
        )?;
        Ok(())
    }

    /// Delete specific keys. Missing keys are not an error.
    pub fn cache_delete(&self, keys: &[&str]) -> Result<u32, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("DELETE FROM calc_cache WHERE cache_key = ?1")?;
        let mut deleted = 0u32;
        for key in keys {
            deleted += stmt.execute(params![key])? as u32;
        }
        Ok(deleted)
    }

    /// Delete every entry whose dependency list contains `upload_id`.
    pub fn cache_delete_by_upload(&self, upload_id: &str) -> Result<u32, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT cache_key, depends_on_uploads FROM calc_cache")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let mut del = conn.prepare("DELETE FROM calc_cache WHERE cache_key = ?1")?;
        let mut deleted = 0u32;
        for (key, deps_raw) in rows {
            let deps: Vec<String> = serde_json::from_str(&deps_raw)?;
            if deps.iter().any(|d| d == upload_id) {
                deleted += del.execute(params![key])? as u32;
            }
        }
        Ok(deleted)
    }

    /// Drop every cached calculation.
    pub fn cache_clear(&self) -> Result<u32, StoreError> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM calc_cache", [])?;
        Ok(n as u32)
    }
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> Result<CacheEntry, StoreError> {
    let result_raw: String = row.get(1)?;
    let updated_raw: String = row.get(2)?;
    let deps_raw: String = row.get(3)?;
    Ok(CacheEntry {
        key: row.get(0)?,
        result: serde_json::from_str(&result_raw)?,
        last_updated: parse_timestamp("calc_cache", &updated_raw)?,
        depends_on_uploads: serde_json::from_str(&deps_raw)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn at_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn round_trip_and_age() {
        let s = store();
        let now = at_noon();
        s.cache_set(
            "live_metrics:u1",
            &json!({"totalOrders": 3}),
            &["upA".to_string()],
            now,
        )
        .unwrap();

        let entry = s.cache_get("live_metrics:u1").unwrap().unwrap();
        assert_eq!(entry.result["totalOrders"], 3);
        assert_eq!(entry.depends_on_uploads, vec!["upA".to_string()]);

        let threshold = chrono::Duration::minutes(5);
        assert!(entry.age(now + chrono::Duration::minutes(4)) < threshold);
        assert!(entry.age(now + chrono::Duration::minutes(6)) >= threshold);
    }

    #[test]
    fn set_refreshes_existing_entry() {
        let s = store();
        let now = at_noon();
        s.cache_set("k", &json!(1), &[], now).unwrap();
        let later = now + chrono::Duration::minutes(2);
        s.cache_set("k", &json!(2), &["upB".to_string()], later)
            .unwrap();

        let entry = s.cache_get("k").unwrap().unwrap();
        assert_eq!(entry.result, json!(2));
        assert_eq!(entry.last_updated, later);
        assert_eq!(entry.depends_on_uploads, vec!["upB".to_string()]);
    }

    #[test]
    fn delete_by_upload_uses_list_membership() {
        let s = store();
        let now = at_noon();
        s.cache_set("a", &json!(1), &["upA".to_string()], now)
            .unwrap();
        s.cache_set(
            "b",
            &json!(2),
            &["upA".to_string(), "upB".to_string()],
            now,
        )
        .unwrap();
        s.cache_set("c", &json!(3), &["upC".to_string()], now)
            .unwrap();

        let deleted = s.cache_delete_by_upload("upA").unwrap();
        assert_eq!(deleted, 2);
        assert!(s.cache_get("a").unwrap().is_none());
        assert!(s.cache_get("b").unwrap().is_none());
        assert!(s.cache_get("c").unwrap().is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let s = store();
        let now = at_noon();
        s.cache_set("a", &json!(1), &[], now).unwrap();
        s.cache_set("b", &json!(2), &[], now).unwrap();
        assert_eq!(s.cache_clear().unwrap(), 2);
        assert!(s.cache_get("a").unwrap().is_none());
        assert_eq!(s.cache_delete(&["a", "b"]).unwrap(), 0);
    }
}
