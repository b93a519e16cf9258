//! Order, payment, product and reconciliation persistence.

use chrono::NaiveDate;
use hisab_core::{Order, Payment, PaymentStatus, Product, ReconStatus, Reconciliation};
use rusqlite::params;
use serde::Serialize;

use crate::{Store, StoreError};

/// Outcome of an append-only payment insert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertStats {
    pub inserted: u32,
    /// Rows already present under the same (sub order, settlement date) key.
    pub ignored: u32,
}

/// Catalog delta harvested from a source file. `orders_seen` feeds the
/// running per-sku order count; cost fields follow the merge policy of
/// whichever store method applies the patch.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub sku: String,
    pub title: String,
    pub cost_price: f64,
    pub packaging_cost: f64,
    pub gst_percent: f64,
    pub orders_seen: u32,
}

const ORDER_COLUMNS: &str = "seller_id, sub_order_no, order_date, customer_state, product_name, \
     sku, size, quantity, listed_price, discounted_price, packet_id, reason_for_credit, \
     payment_status, payment_date, upload_id";

const PAYMENT_COLUMNS: &str = "seller_id, sub_order_no, settlement_date, settlement_amount, \
     order_value, commission_fee, fixed_fee, gateway_fee, ads_fee, upload_id";

const PRODUCT_COLUMNS: &str = "seller_id, sku, title, cost_price, packaging_cost, gst_percent, \
     total_orders, is_processed";

const RECON_COLUMNS: &str = "seller_id, sub_order_no, status, order_value, settlement_amount, \
     product_cost, packaging_cost, ads_cost, gross_profit, net_profit";

impl Store {
    /// Insert or refresh order rows, keyed by (seller, sub order no).
    ///
    /// All data fields follow the incoming row; `payment_date` is kept when
    /// the incoming row has none, since it is set by settlement ingestion
    /// and an order re-upload must not erase it.
    pub fn upsert_orders(&self, orders: &[Order]) -> Result<u32, StoreError> {
        if orders.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO orders (seller_id, sub_order_no, order_date, customer_state, \
                 product_name, sku, size, quantity, listed_price, discounted_price, packet_id, \
                 reason_for_credit, payment_status, payment_date, upload_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15) \
                 ON CONFLICT(seller_id, sub_order_no) DO UPDATE SET \
                     order_date = excluded.order_date, \
                     customer_state = excluded.customer_state, \
                     product_name = excluded.product_name, \
                     sku = excluded.sku, \
                     size = excluded.size, \
                     quantity = excluded.quantity, \
                     listed_price = excluded.listed_price, \
                     discounted_price = excluded.discounted_price, \
                     packet_id = excluded.packet_id, \
                     reason_for_credit = excluded.reason_for_credit, \
                     payment_status = excluded.payment_status, \
                     payment_date = COALESCE(excluded.payment_date, orders.payment_date), \
                     upload_id = excluded.upload_id",
            )?;
            for o in orders {
                stmt.execute(params![
                    o.seller_id,
                    o.sub_order_no,
                    o.order_date.to_string(),
                    o.customer_state,
                    o.product_name,
                    o.sku,
                    o.size,
                    o.quantity,
                    o.listed_price,
                    o.discounted_price,
                    o.packet_id,
                    o.reason_for_credit,
                    o.payment_status.as_str(),
                    o.payment_date.map(|d| d.to_string()),
                    o.upload_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(orders.len() as u32)
    }

    pub fn get_order(
        &self,
        seller_id: &str,
        sub_order_no: &str,
    ) -> Result<Option<Order>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE seller_id = ?1 AND sub_order_no = ?2"
        ))?;
        let mut rows = stmt.query_and_then(params![seller_id, sub_order_no], order_from_row)?;
        rows.next().transpose()
    }

    pub fn list_orders(&self, seller_id: &str) -> Result<Vec<Order>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE seller_id = ?1 \
             ORDER BY order_date, sub_order_no"
        ))?;
        let orders = stmt
            .query_and_then(params![seller_id], order_from_row)?
            .collect();
        orders
    }

    /// Apply a derived payment resolution to an order. Keeps an existing
    /// payment date when the new one is absent. Returns false when no such
    /// order exists (settlements routinely reference unknown orders).
    pub fn set_order_payment(
        &self,
        seller_id: &str,
        sub_order_no: &str,
        status: PaymentStatus,
        date: Option<NaiveDate>,
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let n = conn.execute(
            "UPDATE orders SET payment_status = ?3, \
             payment_date = COALESCE(?4, payment_date) \
             WHERE seller_id = ?1 AND sub_order_no = ?2",
            params![
                seller_id,
                sub_order_no,
                status.as_str(),
                date.map(|d| d.to_string())
            ],
        )?;
        Ok(n > 0)
    }

    /// Overwrite the raw status text with the fresher one a settlement
    /// sheet carries ("Live Order Status").
    pub fn update_order_raw_status(
        &self,
        seller_id: &str,
        sub_order_no: &str,
        raw_status: &str,
    ) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let n = conn.execute(
            "UPDATE orders SET reason_for_credit = ?3 \
             WHERE seller_id = ?1 AND sub_order_no = ?2",
            params![seller_id, sub_order_no, raw_status],
        )?;
        Ok(n > 0)
    }

    /// Append settlement events. Duplicate (sub order, settlement date)
    /// keys are ignored, so replaying an archive is harmless.
    pub fn insert_payments(&self, payments: &[Payment]) -> Result<InsertStats, StoreError> {
        let mut stats = InsertStats::default();
        if payments.is_empty() {
            return Ok(stats);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO payments (seller_id, sub_order_no, settlement_date, \
                 settlement_amount, order_value, commission_fee, fixed_fee, gateway_fee, \
                 ads_fee, upload_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(seller_id, sub_order_no, settlement_date) DO NOTHING",
            )?;
            for p in payments {
                let n = stmt.execute(params![
                    p.seller_id,
                    p.sub_order_no,
                    p.settlement_date.to_string(),
                    p.settlement_amount,
                    p.order_value,
                    p.commission_fee,
                    p.fixed_fee,
                    p.gateway_fee,
                    p.ads_fee,
                    p.upload_id,
                ])?;
                if n == 0 {
                    stats.ignored += 1;
                } else {
                    stats.inserted += 1;
                }
            }
        }
        tx.commit()?;
        Ok(stats)
    }

    /// The settlement event that currently decides an order's payment state:
    /// newest settlement date first, then the larger absolute amount, then
    /// the earliest-inserted row. Deterministic across replays.
    pub fn latest_payment(
        &self,
        seller_id: &str,
        sub_order_no: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE seller_id = ?1 AND sub_order_no = ?2 \
             ORDER BY settlement_date DESC, ABS(settlement_amount) DESC, rowid ASC \
             LIMIT 1"
        ))?;
        let mut rows = stmt.query_and_then(params![seller_id, sub_order_no], payment_from_row)?;
        rows.next().transpose()
    }

    pub fn list_payments(&self, seller_id: &str) -> Result<Vec<Payment>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE seller_id = ?1 \
             ORDER BY sub_order_no, settlement_date, rowid"
        ))?;
        let payments = stmt
            .query_and_then(params![seller_id], payment_from_row)?
            .collect();
        payments
    }

    /// Merge catalog entries discovered while parsing order rows.
    ///
    /// Conservative: never clobbers a non-default value a seller may have
    /// entered. Costs fill in only when currently zero, the title only when
    /// currently empty, and `is_processed` is left alone.
    pub fn seed_products(
        &self,
        seller_id: &str,
        seeds: &[ProductPatch],
    ) -> Result<(), StoreError> {
        if seeds.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO products (seller_id, sku, title, cost_price, packaging_cost, \
                 gst_percent, total_orders, is_processed) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0) \
                 ON CONFLICT(seller_id, sku) DO UPDATE SET \
                     title = CASE WHEN products.title = '' THEN excluded.title \
                                  ELSE products.title END, \
                     cost_price = CASE WHEN products.cost_price = 0 THEN excluded.cost_price \
                                       ELSE products.cost_price END, \
                     packaging_cost = CASE WHEN products.packaging_cost = 0 \
                                           THEN excluded.packaging_cost \
                                           ELSE products.packaging_cost END, \
                     gst_percent = CASE WHEN products.gst_percent = 0 THEN excluded.gst_percent \
                                        ELSE products.gst_percent END, \
                     total_orders = products.total_orders + excluded.total_orders",
            )?;
            for seed in seeds {
                stmt.execute(params![
                    seller_id,
                    seed.sku,
                    seed.title,
                    seed.cost_price,
                    seed.packaging_cost,
                    seed.gst_percent,
                    seed.orders_seen,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Apply rows from a seller's own products file. Non-empty values are
    /// authoritative and overwrite; blank titles and zero cost cells keep
    /// whatever the seller already has, so a sparse catalog file cannot
    /// reset edited costs back to defaults.
    pub fn upsert_products(
        &self,
        seller_id: &str,
        rows: &[ProductPatch],
    ) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO products (seller_id, sku, title, cost_price, packaging_cost, \
                 gst_percent, total_orders, is_processed) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 1) \
                 ON CONFLICT(seller_id, sku) DO UPDATE SET \
                     title = CASE WHEN excluded.title = '' THEN products.title \
                                  ELSE excluded.title END, \
                     cost_price = CASE WHEN excluded.cost_price = 0 THEN products.cost_price \
                                       ELSE excluded.cost_price END, \
                     packaging_cost = CASE WHEN excluded.packaging_cost = 0 \
                                           THEN products.packaging_cost \
                                           ELSE excluded.packaging_cost END, \
                     gst_percent = CASE WHEN excluded.gst_percent = 0 THEN products.gst_percent \
                                        ELSE excluded.gst_percent END, \
                     is_processed = 1",
            )?;
            for row in rows {
                stmt.execute(params![
                    seller_id,
                    row.sku,
                    row.title,
                    row.cost_price,
                    row.packaging_cost,
                    row.gst_percent,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Seller edit of one sku's cost fields. Passing `None` for GST keeps
    /// the stored percentage.
    pub fn set_product_costs(
        &self,
        seller_id: &str,
        sku: &str,
        cost_price: f64,
        packaging_cost: f64,
        gst_percent: Option<f64>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO products (seller_id, sku, cost_price, packaging_cost, gst_percent, \
             is_processed) \
             VALUES (?1, ?2, ?3, ?4, COALESCE(?5, 0), 1) \
             ON CONFLICT(seller_id, sku) DO UPDATE SET \
                 cost_price = excluded.cost_price, \
                 packaging_cost = excluded.packaging_cost, \
                 gst_percent = COALESCE(?5, products.gst_percent), \
                 is_processed = 1",
            params![seller_id, sku, cost_price, packaging_cost, gst_percent],
        )?;
        Ok(())
    }

    /// Apply GST percentages harvested from settlement sheets. Updates only
    /// skus already in the catalog; returns how many rows were touched.
    pub fn update_product_gst(
        &self,
        seller_id: &str,
        updates: &[(String, f64)],
    ) -> Result<u32, StoreError> {
        if updates.is_empty() {
            return Ok(0);
        }
        let mut touched = 0u32;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE products SET gst_percent = ?3 WHERE seller_id = ?1 AND sku = ?2",
            )?;
            for (sku, gst) in updates {
                touched += stmt.execute(params![seller_id, sku, gst])? as u32;
            }
        }
        tx.commit()?;
        Ok(touched)
    }

    pub fn get_product(&self, seller_id: &str, sku: &str) -> Result<Option<Product>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE seller_id = ?1 AND sku = ?2"
        ))?;
        let mut rows = stmt.query_and_then(params![seller_id, sku], product_from_row)?;
        rows.next().transpose()
    }

    pub fn list_products(&self, seller_id: &str) -> Result<Vec<Product>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE seller_id = ?1 ORDER BY sku"
        ))?;
        let products = stmt
            .query_and_then(params![seller_id], product_from_row)?
            .collect();
        products
    }

    /// Replace a seller's reconciliation outcomes wholesale. Runs in one
    /// transaction so readers never see a half-replaced set.
    pub fn replace_reconciliations(
        &self,
        seller_id: &str,
        rows: &[Reconciliation],
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM reconciliations WHERE seller_id = ?1",
            params![seller_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO reconciliations (seller_id, sub_order_no, status, order_value, \
                 settlement_amount, product_cost, packaging_cost, ads_cost, gross_profit, \
                 net_profit) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for r in rows {
                stmt.execute(params![
                    r.seller_id,
                    r.sub_order_no,
                    r.status.as_str(),
                    r.order_value,
                    r.settlement_amount,
                    r.product_cost,
                    r.packaging_cost,
                    r.ads_cost,
                    r.gross_profit,
                    r.net_profit,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn list_reconciliations(&self, seller_id: &str) -> Result<Vec<Reconciliation>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECON_COLUMNS} FROM reconciliations WHERE seller_id = ?1 \
             ORDER BY sub_order_no"
        ))?;
        let recons = stmt
            .query_and_then(params![seller_id], recon_from_row)?
            .collect();
        recons
    }
}

fn order_from_row(row: &rusqlite::Row<'_>) -> Result<Order, StoreError> {
    let order_date_raw: String = row.get(2)?;
    let payment_status_raw: String = row.get(12)?;
    let payment_date_raw: Option<String> = row.get(13)?;
    Ok(Order {
        seller_id: row.get(0)?,
        sub_order_no: row.get(1)?,
        order_date: parse_day("orders", "order_date", &order_date_raw)?,
        customer_state: row.get(3)?,
        product_name: row.get(4)?,
        sku: row.get(5)?,
        size: row.get(6)?,
        quantity: row.get(7)?,
        listed_price: row.get(8)?,
        discounted_price: row.get(9)?,
        packet_id: row.get(10)?,
        reason_for_credit: row.get(11)?,
        payment_status: PaymentStatus::parse(&payment_status_raw).ok_or_else(|| {
            StoreError::Corrupt {
                table: "orders",
                column: "payment_status",
                value: payment_status_raw.clone(),
            }
        })?,
        payment_date: payment_date_raw
            .as_deref()
            .map(|s| parse_day("orders", "payment_date", s))
            .transpose()?,
        upload_id: row.get(14)?,
    })
}

fn payment_from_row(row: &rusqlite::Row<'_>) -> Result<Payment, StoreError> {
    let settlement_date_raw: String = row.get(2)?;
    Ok(Payment {
        seller_id: row.get(0)?,
        sub_order_no: row.get(1)?,
        settlement_date: parse_day("payments", "settlement_date", &settlement_date_raw)?,
        settlement_amount: row.get(3)?,
        order_value: row.get(4)?,
        commission_fee: row.get(5)?,
        fixed_fee: row.get(6)?,
        gateway_fee: row.get(7)?,
        ads_fee: row.get(8)?,
        upload_id: row.get(9)?,
    })
}

fn product_from_row(row: &rusqlite::Row<'_>) -> Result<Product, StoreError> {
    Ok(Product {
        seller_id: row.get(0)?,
        sku: row.get(1)?,
        title: row.get(2)?,
        cost_price: row.get(3)?,
        packaging_cost: row.get(4)?,
        gst_percent: row.get(5)?,
        total_orders: row.get(6)?,
        is_processed: row.get(7)?,
    })
}

fn recon_from_row(row: &rusqlite::Row<'_>) -> Result<Reconciliation, StoreError> {
    let status_raw: String = row.get(2)?;
    Ok(Reconciliation {
        seller_id: row.get(0)?,
        sub_order_no: row.get(1)?,
        status: ReconStatus::parse(&status_raw).ok_or_else(|| StoreError::Corrupt {
            table: "reconciliations",
            column: "status",
            value: status_raw.clone(),
        })?,
        order_value: row.get(3)?,
        settlement_amount: row.get(4)?,
        product_cost: row.get(5)?,
        packaging_cost: row.get(6)?,
        ads_cost: row.get(7)?,
        gross_profit: row.get(8)?,
        net_profit: row.get(9)?,
    })
}

fn parse_day(table: &'static str, column: &'static str, s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StoreError::Corrupt {
        table,
        column,
        value: s.to_string(),
    })
}
