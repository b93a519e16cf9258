//! SQLite-backed record store for the Hisab ledger.
//!
//! One [`Store`] handle per database, constructed explicitly and passed
//! into the pipeline (no ambient singletons). Access is serialized through
//! a connection mutex; multi-step invariants additionally run inside
//! SQLite transactions so readers observe them atomically.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

pub mod cache;
pub mod dynamic;
pub mod error;
pub mod records;
pub mod uploads;
pub mod usage;

pub use cache::CacheEntry;
pub use error::StoreError;
pub use records::{InsertStats, ProductPatch};
pub use usage::{QuotaOutcome, UsageCounter};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS uploads (
    id TEXT PRIMARY KEY,
    seller_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    file_type TEXT NOT NULL,            -- orders_csv | payment_zip | products_csv
    status TEXT NOT NULL,               -- processing | processed | failed
    records_processed INTEGER NOT NULL DEFAULT 0,
    errors TEXT NOT NULL DEFAULT '[]',  -- JSON array of strings
    is_current_version INTEGER NOT NULL DEFAULT 0,
    column_structure TEXT,              -- JSON array of inferred columns
    created_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_uploads_seller_type ON uploads(seller_id, file_type);

CREATE TABLE IF NOT EXISTS orders (
    seller_id TEXT NOT NULL,
    sub_order_no TEXT NOT NULL,
    order_date TEXT NOT NULL,
    customer_state TEXT NOT NULL DEFAULT '',
    product_name TEXT NOT NULL DEFAULT '',
    sku TEXT NOT NULL DEFAULT '',
    size TEXT NOT NULL DEFAULT '',
    quantity INTEGER NOT NULL DEFAULT 1,
    listed_price REAL NOT NULL DEFAULT 0,
    discounted_price REAL NOT NULL DEFAULT 0,
    packet_id TEXT NOT NULL DEFAULT '',
    reason_for_credit TEXT NOT NULL DEFAULT '',
    payment_status TEXT NOT NULL DEFAULT 'Pending',
    payment_date TEXT,
    upload_id TEXT NOT NULL,
    PRIMARY KEY (seller_id, sub_order_no)
);

CREATE TABLE IF NOT EXISTS payments (
    seller_id TEXT NOT NULL,
    sub_order_no TEXT NOT NULL,
    settlement_date TEXT NOT NULL,
    settlement_amount REAL NOT NULL DEFAULT 0,
    order_value REAL NOT NULL DEFAULT 0,
    commission_fee REAL NOT NULL DEFAULT 0,
    fixed_fee REAL NOT NULL DEFAULT 0,
    gateway_fee REAL NOT NULL DEFAULT 0,
    ads_fee REAL NOT NULL DEFAULT 0,
    upload_id TEXT NOT NULL,
    PRIMARY KEY (seller_id, sub_order_no, settlement_date)
);

CREATE INDEX IF NOT EXISTS idx_payments_sub_order ON payments(seller_id, sub_order_no);

CREATE TABLE IF NOT EXISTS products (
    seller_id TEXT NOT NULL,
    sku TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    cost_price REAL NOT NULL DEFAULT 0,
    packaging_cost REAL NOT NULL DEFAULT 0,
    gst_percent REAL NOT NULL DEFAULT 0,
    total_orders INTEGER NOT NULL DEFAULT 0,
    is_processed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (seller_id, sku)
);

CREATE TABLE IF NOT EXISTS dynamic_orders (
    seller_id TEXT NOT NULL,
    record_key TEXT NOT NULL,
    upload_id TEXT NOT NULL,
    known TEXT NOT NULL DEFAULT '{}',   -- JSON, typed common subset
    extra TEXT NOT NULL DEFAULT '{}',   -- JSON, passthrough columns
    PRIMARY KEY (seller_id, record_key, upload_id)
);

CREATE TABLE IF NOT EXISTS dynamic_products (
    seller_id TEXT NOT NULL,
    record_key TEXT NOT NULL,
    upload_id TEXT NOT NULL,
    known TEXT NOT NULL DEFAULT '{}',
    extra TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (seller_id, record_key, upload_id)
);

CREATE TABLE IF NOT EXISTS reconciliations (
    seller_id TEXT NOT NULL,
    sub_order_no TEXT NOT NULL,
    status TEXT NOT NULL,               -- reconciled | mismatch | unreconciled
    order_value REAL NOT NULL DEFAULT 0,
    settlement_amount REAL NOT NULL DEFAULT 0,
    product_cost REAL NOT NULL DEFAULT 0,
    packaging_cost REAL NOT NULL DEFAULT 0,
    ads_cost REAL NOT NULL DEFAULT 0,
    gross_profit REAL NOT NULL DEFAULT 0,
    net_profit REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (seller_id, sub_order_no)
);

CREATE TABLE IF NOT EXISTS calc_cache (
    cache_key TEXT PRIMARY KEY,
    result TEXT NOT NULL,               -- JSON
    last_updated TEXT NOT NULL,
    depends_on_uploads TEXT NOT NULL DEFAULT '[]'  -- JSON array of upload ids
);

CREATE TABLE IF NOT EXISTS usage_counters (
    seller_id TEXT PRIMARY KEY,
    period_year INTEGER NOT NULL,
    period_month INTEGER NOT NULL,
    uploads_used INTEGER NOT NULL DEFAULT 0
);
"#;

/// Handle to one ledger database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) a ledger database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Fresh in-memory database; used by tests and `--db :memory:` runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let store = Store::open(&path).unwrap();
        drop(store);
        // Reopen against the existing file; schema is idempotent.
        let store = Store::open(&path).unwrap();
        let conn = store.lock().unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM uploads", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }
}
