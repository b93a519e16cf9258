//! Upload lifecycle: create, finish, current-version flip, listing.

use chrono::{DateTime, Utc};
use hisab_core::{ColumnSpec, FileType, Upload, UploadStatus};
use rusqlite::params;

use crate::{Store, StoreError};

const UPLOAD_COLUMNS: &str = "id, seller_id, filename, file_type, status, records_processed, \
     errors, is_current_version, column_structure, created_at, finished_at";

impl Store {
    /// Persist a new upload row (normally status=processing).
    pub fn create_upload(&self, upload: &Upload) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO uploads (id, seller_id, filename, file_type, status, records_processed, \
             errors, is_current_version, column_structure, created_at, finished_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                upload.id,
                upload.seller_id,
                upload.filename,
                upload.file_type.as_str(),
                upload.status.as_str(),
                upload.records_processed,
                serde_json::to_string(&upload.errors)?,
                upload.is_current_version,
                serde_json::to_string(&upload.column_structure)?,
                upload.created_at.to_rfc3339(),
                upload.finished_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Write the terminal state of an upload job.
    pub fn finish_upload(
        &self,
        id: &str,
        status: UploadStatus,
        records_processed: u32,
        errors: &[String],
        column_structure: &[ColumnSpec],
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let n = conn.execute(
            "UPDATE uploads SET status = ?2, records_processed = ?3, errors = ?4, \
             column_structure = ?5, finished_at = ?6 WHERE id = ?1",
            params![
                id,
                status.as_str(),
                records_processed,
                serde_json::to_string(errors)?,
                serde_json::to_string(column_structure)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                entity: "upload",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Flip the current-version flag to `upload_id` for (seller, file type).
    ///
    /// One transaction clears the previous flag and sets the new one, so a
    /// concurrent reader never observes zero or two current uploads.
    pub fn mark_current_version(
        &self,
        seller_id: &str,
        file_type: FileType,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE uploads SET is_current_version = 0 \
             WHERE seller_id = ?1 AND file_type = ?2 AND is_current_version = 1",
            params![seller_id, file_type.as_str()],
        )?;
        let n = tx.execute(
            "UPDATE uploads SET is_current_version = 1 WHERE id = ?1",
            params![upload_id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                entity: "upload",
                id: upload_id.to_string(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_upload(&self, id: &str) -> Result<Upload, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = ?1"))?;
        let mut rows = stmt.query_and_then(params![id], upload_from_row)?;
        match rows.next() {
            Some(upload) => upload,
            None => Err(StoreError::NotFound {
                entity: "upload",
                id: id.to_string(),
            }),
        }
    }

    /// Recent uploads for a seller, newest first.
    pub fn list_uploads(&self, seller_id: &str, limit: u32) -> Result<Vec<Upload>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads WHERE seller_id = ?1 \
             ORDER BY created_at DESC, id LIMIT ?2"
        ))?;
        let uploads = stmt
            .query_and_then(params![seller_id, limit], upload_from_row)?
            .collect();
        uploads
    }

    /// The authoritative upload for a file type, if one has been marked.
    pub fn current_upload(
        &self,
        seller_id: &str,
        file_type: FileType,
    ) -> Result<Option<Upload>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads \
             WHERE seller_id = ?1 AND file_type = ?2 AND is_current_version = 1"
        ))?;
        let mut rows =
            stmt.query_and_then(params![seller_id, file_type.as_str()], upload_from_row)?;
        rows.next().transpose()
    }
}

fn upload_from_row(row: &rusqlite::Row<'_>) -> Result<Upload, StoreError> {
    let file_type_raw: String = row.get(3)?;
    let status_raw: String = row.get(4)?;
    let errors_raw: String = row.get(6)?;
    let column_raw: Option<String> = row.get(8)?;
    let created_raw: String = row.get(9)?;
    let finished_raw: Option<String> = row.get(10)?;

    Ok(Upload {
        id: row.get(0)?,
        seller_id: row.get(1)?,
        filename: row.get(2)?,
        file_type: FileType::parse(&file_type_raw).ok_or_else(|| StoreError::Corrupt {
            table: "uploads",
            column: "file_type",
            value: file_type_raw.clone(),
        })?,
        status: UploadStatus::parse(&status_raw).ok_or_else(|| StoreError::Corrupt {
            table: "uploads",
            column: "status",
            value: status_raw.clone(),
        })?,
        records_processed: row.get(5)?,
        errors: serde_json::from_str(&errors_raw)?,
        is_current_version: row.get(7)?,
        column_structure: match column_raw {
            Some(s) if !s.is_empty() => serde_json::from_str(&s)?,
            _ => Vec::new(),
        },
        created_at: parse_timestamp("uploads", &created_raw)?,
        finished_at: finished_raw
            .as_deref()
            .map(|s| parse_timestamp("uploads", s))
            .transpose()?,
    })
}

pub(crate) fn parse_timestamp(table: &'static str, s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            table,
            column: "timestamp",
            value: s.to_string(),
        })
}
