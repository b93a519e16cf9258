//! Schema-flexible record storage.
//!
//! Two write policies, chosen per ingestion call site: replace (wipe then
//! bulk insert) and add-unique (insert, silently skipping rows that collide
//! on the (key, upload) constraint).

use hisab_core::DynamicRecord;
use rusqlite::params;

use crate::{Store, StoreError};

impl Store {
    /// Replace the seller's entire dynamic order set with `records`.
    ///
    /// The delete is seller-wide, not scoped to an upload id. Product
    /// dynamic rows scope their delete to the triggering upload instead.
    pub fn replace_dynamic_orders(
        &self,
        seller_id: &str,
        records: &[DynamicRecord],
    ) -> Result<u32, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM dynamic_orders WHERE seller_id = ?1",
            params![seller_id],
        )?;
        let inserted = insert_dynamic(&tx, "dynamic_orders", seller_id, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Replace the dynamic product rows belonging to one upload.
    pub fn replace_dynamic_products(
        &self,
        seller_id: &str,
        upload_id: &str,
        records: &[DynamicRecord],
    ) -> Result<u32, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM dynamic_products WHERE seller_id = ?1 AND upload_id = ?2",
            params![seller_id, upload_id],
        )?;
        let inserted = insert_dynamic(&tx, "dynamic_products", seller_id, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Insert dynamic order rows, skipping keys already stored for the same
    /// upload. Returns how many rows were actually inserted.
    pub fn add_unique_dynamic_orders(
        &self,
        seller_id: &str,
        records: &[DynamicRecord],
    ) -> Result<u32, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = insert_dynamic(&tx, "dynamic_orders", seller_id, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Insert dynamic product rows, skipping keys already stored for the
    /// same upload.
    pub fn add_unique_dynamic_products(
        &self,
        seller_id: &str,
        records: &[DynamicRecord],
    ) -> Result<u32, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = insert_dynamic(&tx, "dynamic_products", seller_id, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn list_dynamic_orders(&self, seller_id: &str) -> Result<Vec<DynamicRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT record_key, upload_id, known, extra FROM dynamic_orders \
             WHERE seller_id = ?1 ORDER BY record_key",
        )?;
        let records = stmt
            .query_and_then(params![seller_id], dynamic_from_row)?
            .collect();
        records
    }

    /// Dynamic product rows are version-scoped, so reads name the upload.
    pub fn list_dynamic_products(
        &self,
        seller_id: &str,
        upload_id: &str,
    ) -> Result<Vec<DynamicRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT record_key, upload_id, known, extra FROM dynamic_products \
             WHERE seller_id = ?1 AND upload_id = ?2 ORDER BY record_key",
        )?;
        let records = stmt
            .query_and_then(params![seller_id, upload_id], dynamic_from_row)?
            .collect();
        records
    }
}

fn insert_dynamic(
    tx: &rusqlite::Transaction<'_>,
    table: &str,
    seller_id: &str,
    records: &[DynamicRecord],
) -> Result<u32, StoreError> {
    let mut stmt = tx.prepare(&format!(
        "INSERT OR IGNORE INTO {table} (seller_id, record_key, upload_id, known, extra) \
         VALUES (?1, ?2, ?3, ?4, ?5)"
    ))?;
    let mut inserted = 0u32;
    for r in records {
        let n = stmt.execute(params![
            seller_id,
            r.key,
            r.upload_id,
            serde_json::to_string(&r.known)?,
            serde_json::to_string(&r.extra)?,
        ])?;
        inserted += n as u32;
    }
    Ok(inserted)
}

fn dynamic_from_row(row: &rusqlite::Row<'_>) -> Result<DynamicRecord, StoreError> {
    let known_raw: String = row.get(2)?;
    let extra_raw: String = row.get(3)?;
    Ok(DynamicRecord {
        key: row.get(0)?,
        upload_id: row.get(1)?,
        known: serde_json::from_str(&known_raw)?,
        extra: serde_json::from_str(&extra_raw)?,
    })
}
