//! Monthly upload quota accounting.

use rusqlite::params;

use crate::{Store, StoreError};

/// Stored quota state for one seller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageCounter {
    pub seller_id: String,
    pub period_year: i32,
    pub period_month: u32,
    pub uploads_used: u32,
}

/// Result of one quota tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaOutcome {
    Allowed { used: u32 },
    Exhausted { used: u32 },
}

impl Store {
    /// Count one upload against the seller's monthly quota.
    ///
    /// The check-and-increment is a single conditional UPDATE so parallel
    /// uploads cannot both squeeze past the limit; the WHERE clause
    /// evaluates the would-be new count. A stored period older than
    /// (`year`, `month`) rolls the counter over to 1 in the same statement.
    pub fn try_consume_upload(
        &self,
        seller_id: &str,
        year: i32,
        month: u32,
        limit: u32,
    ) -> Result<QuotaOutcome, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO usage_counters (seller_id, period_year, period_month, uploads_used) \
             VALUES (?1, ?2, ?3, 0)",
            params![seller_id, year, month],
        )?;
        let n = tx.execute(
            "UPDATE usage_counters SET \
                 uploads_used = CASE WHEN period_year = ?2 AND period_month = ?3 \
                                     THEN uploads_used + 1 ELSE 1 END, \
                 period_year = ?2, \
                 period_month = ?3 \
             WHERE seller_id = ?1 \
               AND (CASE WHEN period_year = ?2 AND period_month = ?3 \
                         THEN uploads_used + 1 ELSE 1 END) <= ?4",
            params![seller_id, year, month, limit],
        )?;
        let used: u32 = tx.query_row(
            "SELECT uploads_used FROM usage_counters WHERE seller_id = ?1",
            params![seller_id],
            |row| row.get(0),
        )?;
        tx.commit()?;
        if n == 0 {
            Ok(QuotaOutcome::Exhausted { used })
        } else {
            Ok(QuotaOutcome::Allowed { used })
        }
    }

    pub fn get_usage(&self, seller_id: &str) -> Result<Option<UsageCounter>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT seller_id, period_year, period_month, uploads_used \
             FROM usage_counters WHERE seller_id = ?1",
        )?;
        let mut rows = stmt.query_and_then(params![seller_id], |row| {
            Ok::<_, StoreError>(UsageCounter {
                seller_id: row.get(0)?,
                period_year: row.get(1)?,
                period_month: row.get(2)?,
                uploads_used: row.get(3)?,
            })
        })?;
        rows.next().transpose()
    }
}
