//! The three ingestion flows.
//!
//! Each flow runs the same arc: parse, persist typed rows, mirror the raw
//! rows into dynamic storage, reconcile, resolve the upload row, flip the
//! current-version pointer, refresh the cache. Row-level problems land in
//! the upload's error list and never abort the file; an upload only fails
//! when the file itself is unreadable or a store write refuses.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::Serialize;

use hisab_core::{
    derive_payment_status, normalize_order_status, DynamicRecord, FileType, KnownFields, Order,
    Payment, RawRow, Scalar, Upload, UploadStatus,
};
use hisab_ingest::{
    extract_archive, infer_columns, parse_orders_csv, parse_products_csv, parse_settlement_csv,
    parse_settlement_workbook, FileKind, OrderDraft, ParsedOrders, ParsedProducts,
    ParsedSettlements, ProductDraft,
};
use hisab_store::ProductPatch;

use crate::jobs::JobGuard;
use crate::{Pipeline, PipelineError};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of one ingestion run, mirrored from the upload row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub upload_id: String,
    pub status: UploadStatus,
    pub records_processed: u32,
    pub errors: Vec<String>,
}

impl IngestReport {
    fn resolved(upload_id: &str, status: UploadStatus, records: u32, errors: Vec<String>) -> Self {
        Self {
            upload_id: upload_id.to_string(),
            status,
            records_processed: records,
            errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

impl Pipeline {
    /// Ingest an order manifest synchronously, quota gate included.
    pub fn ingest_orders_file(
        &self,
        seller_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, PipelineError> {
        self.consume_quota(seller_id)?;
        let upload_id = self.begin_upload(seller_id, filename, FileType::OrdersCsv)?;
        Ok(self.run_orders_job(seller_id, &upload_id, bytes, &JobGuard::unbounded()))
    }

    /// Ingest a settlement archive synchronously, quota gate included.
    pub fn ingest_payments_archive(
        &self,
        seller_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, PipelineError> {
        self.consume_quota(seller_id)?;
        let upload_id = self.begin_upload(seller_id, filename, FileType::PaymentZip)?;
        Ok(self.run_payments_job(seller_id, &upload_id, bytes, &JobGuard::unbounded()))
    }

    /// Ingest a product catalog synchronously, quota gate included.
    pub fn ingest_products_file(
        &self,
        seller_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, PipelineError> {
        self.consume_quota(seller_id)?;
        let upload_id = self.begin_upload(seller_id, filename, FileType::ProductsCsv)?;
        Ok(self.run_products_job(seller_id, &upload_id, bytes, &JobGuard::unbounded()))
    }

    /// Persist the `processing` row a submission hands back immediately.
    pub(crate) fn begin_upload(
        &self,
        seller_id: &str,
        filename: &str,
        file_type: FileType,
    ) -> Result<String, PipelineError> {
        let upload = Upload {
            id: uuid::Uuid::new_v4().to_string(),
            seller_id: seller_id.to_string(),
            filename: filename.to_string(),
            file_type,
            status: UploadStatus::Processing,
            records_processed: 0,
            errors: Vec::new(),
            is_current_version: false,
            column_structure: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        };
        self.store().create_upload(&upload)?;
        tracing::info!(
            upload_id = %upload.id,
            seller_id,
            file_type = file_type.as_str(),
            filename,
            "upload accepted"
        );
        Ok(upload.id)
    }
}

// ---------------------------------------------------------------------------
// Worker-side jobs
// ---------------------------------------------------------------------------

impl Pipeline {
    /// Run the orders flow against an already-created upload row. Never
    /// returns an error: anything fatal resolves the row to `failed`.
    pub(crate) fn run_orders_job(
        &self,
        seller_id: &str,
        upload_id: &str,
        bytes: &[u8],
        guard: &JobGuard,
    ) -> IngestReport {
        match self.orders_steps(seller_id, upload_id, bytes, guard) {
            Ok(report) => report,
            Err(e) => self.fail_upload(upload_id, e),
        }
    }

    pub(crate) fn run_payments_job(
        &self,
        seller_id: &str,
        upload_id: &str,
        bytes: &[u8],
        guard: &JobGuard,
    ) -> IngestReport {
        match self.payments_steps(seller_id, upload_id, bytes, guard) {
            Ok(report) => report,
            Err(e) => self.fail_upload(upload_id, e),
        }
    }

    pub(crate) fn run_products_job(
        &self,
        seller_id: &str,
        upload_id: &str,
        bytes: &[u8],
        guard: &JobGuard,
    ) -> IngestReport {
        match self.products_steps(seller_id, upload_id, bytes, guard) {
            Ok(report) => report,
            Err(e) => self.fail_upload(upload_id, e),
        }
    }

    /// Resolve the upload row to `failed` carrying the error message. Used
    /// for store refusals, cancellation and deadline overruns; the row must
    /// reach a terminal status no matter what.
    fn fail_upload(&self, upload_id: &str, e: PipelineError) -> IngestReport {
        tracing::error!(upload_id, error = %e, "ingestion failed");
        let errors = vec![e.to_string()];
        if let Err(e2) = self
            .store()
            .finish_upload(upload_id, UploadStatus::Failed, 0, &errors, &[])
        {
            tracing::error!(upload_id, error = %e2, "could not record upload failure");
        }
        IngestReport::resolved(upload_id, UploadStatus::Failed, 0, errors)
    }

    // -- orders -------------------------------------------------------------

    fn orders_steps(
        &self,
        seller_id: &str,
        upload_id: &str,
        bytes: &[u8],
        guard: &JobGuard,
    ) -> Result<IngestReport, PipelineError> {
        guard.check()?;
        let parsed = parse_orders_csv(bytes);
        if file_unreadable(parsed.orders.is_empty(), parsed.rows.is_empty(), &parsed.errors) {
            self.store()
                .finish_upload(upload_id, UploadStatus::Failed, 0, &parsed.errors, &[])?;
            return Ok(IngestReport::resolved(
                upload_id,
                UploadStatus::Failed,
                0,
                parsed.errors,
            ));
        }
        let ParsedOrders {
            headers,
            rows,
            orders: drafts,
            product_seeds,
            errors,
        } = parsed;

        // Dynamic mirror and per-sku order counts come off the drafts before
        // identity stamping consumes them.
        let mut dynamic = Vec::with_capacity(drafts.len());
        let mut seen: BTreeMap<String, u32> = BTreeMap::new();
        for draft in &drafts {
            dynamic.push(dynamic_order_record(draft, upload_id));
            *seen.entry(draft.sku.clone()).or_insert(0) += 1;
        }

        guard.check()?;
        let today = Utc::now().date_naive();
        let orders: Vec<Order> = drafts
            .into_iter()
            .map(|d| d.into_order(seller_id, upload_id, today))
            .collect();
        let records = self.store().upsert_orders(&orders)?;

        let seeds: Vec<ProductPatch> = product_seeds
            .into_iter()
            .map(|(sku, seed)| {
                let orders_seen = seen.get(&sku).copied().unwrap_or(0);
                ProductPatch {
                    sku,
                    title: seed.name,
                    cost_price: seed.cost_price,
                    packaging_cost: 0.0,
                    gst_percent: seed.gst_percent,
                    orders_seen,
                }
            })
            .collect();
        self.store().seed_products(seller_id, &seeds)?;

        // A manifest is the full current truth, so the overlay is replaced
        // seller-wide, settlement-contributed rows included.
        self.store().replace_dynamic_orders(seller_id, &dynamic)?;

        guard.check()?;
        self.run_reconciliation(seller_id)?;

        let columns = infer_columns(&headers, &rows);
        self.store()
            .finish_upload(upload_id, UploadStatus::Processed, records, &errors, &columns)?;
        self.store()
            .mark_current_version(seller_id, FileType::OrdersCsv, upload_id)?;
        self.refresh_cache(seller_id, upload_id);

        Ok(IngestReport::resolved(
            upload_id,
            UploadStatus::Processed,
            records,
            errors,
        ))
    }

    // -- payments -----------------------------------------------------------

    fn payments_steps(
        &self,
        seller_id: &str,
        upload_id: &str,
        bytes: &[u8],
        guard: &JobGuard,
    ) -> Result<IngestReport, PipelineError> {
        guard.check()?;
        let listing = extract_archive(bytes);
        if listing.files.is_empty() {
            let mut errors = listing.errors;
            if errors.is_empty() {
                errors.push("archive contains no file members".to_string());
            }
            self.store()
                .finish_upload(upload_id, UploadStatus::Failed, 0, &errors, &[])?;
            return Ok(IngestReport::resolved(
                upload_id,
                UploadStatus::Failed,
                0,
                errors,
            ));
        }

        // Merge every tabular member; errors keep the member name so the
        // seller can tell which sheet inside the archive misbehaved.
        let mut errors = listing.errors;
        let mut merged = ParsedSettlements::default();
        for file in &listing.files {
            let parsed = match file.kind {
                FileKind::Xlsx | FileKind::Xls => parse_settlement_workbook(&file.bytes),
                FileKind::Csv => parse_settlement_csv(&file.bytes),
                FileKind::Unknown => {
                    tracing::debug!(member = %file.name, "skipping non-tabular archive member");
                    continue;
                }
            };
            errors.extend(parsed.errors.into_iter().map(|e| format!("{}: {e}", file.name)));
            merged.payments.extend(parsed.payments);
            merged.gst_updates.extend(parsed.gst_updates);
            merged.status_updates.extend(parsed.status_updates);
        }

        guard.check()?;
        let today = Utc::now().date_naive();
        let payments: Vec<Payment> = merged
            .payments
            .into_iter()
            .map(|d| d.into_payment(seller_id, upload_id, today))
            .collect();
        let stats = self.store().insert_payments(&payments)?;
        if stats.ignored > 0 {
            // Re-uploaded archives overlap; duplicates are expected, not errors.
            tracing::debug!(
                seller_id,
                ignored = stats.ignored,
                "duplicate settlement rows skipped"
            );
        }

        // Fresher raw statuses off the sheet first, so the payment
        // resolution below reads them.
        for (sub, raw) in &merged.status_updates {
            self.store().update_order_raw_status(seller_id, sub, raw)?;
        }
        let gst_touched = self
            .store()
            .update_product_gst(seller_id, &merged.gst_updates)?;
        if gst_touched > 0 {
            tracing::debug!(seller_id, gst_touched, "gst percentages harvested");
        }

        guard.check()?;
        let mut subs: Vec<&str> = payments.iter().map(|p| p.sub_order_no.as_str()).collect();
        subs.sort_unstable();
        subs.dedup();
        for sub in subs {
            let Some(latest) = self.store().latest_payment(seller_id, sub)? else {
                continue;
            };
            let Some(order) = self.store().get_order(seller_id, sub)? else {
                // Settlements routinely reference orders outside the manifest.
                continue;
            };
            let canonical = normalize_order_status(&order.reason_for_credit);
            let resolved = derive_payment_status(canonical, Some(latest.settlement_amount), None);
            self.store()
                .set_order_payment(seller_id, sub, resolved, Some(latest.settlement_date))?;
        }

        let dynamic = dynamic_settlement_records(&payments, &merged.status_updates, upload_id);
        self.store().add_unique_dynamic_orders(seller_id, &dynamic)?;

        guard.check()?;
        self.run_reconciliation(seller_id)?;

        self.store()
            .finish_upload(upload_id, UploadStatus::Processed, stats.inserted, &errors, &[])?;
        self.store()
            .mark_current_version(seller_id, FileType::PaymentZip, upload_id)?;
        self.refresh_cache(seller_id, upload_id);

        Ok(IngestReport::resolved(
            upload_id,
            UploadStatus::Processed,
            stats.inserted,
            errors,
        ))
    }

    // -- products -----------------------------------------------------------

    fn products_steps(
        &self,
        seller_id: &str,
        upload_id: &str,
        bytes: &[u8],
        guard: &JobGuard,
    ) -> Result<IngestReport, PipelineError> {
        guard.check()?;
        let parsed = parse_products_csv(bytes);
        if file_unreadable(
            parsed.products.is_empty(),
            parsed.rows.is_empty(),
            &parsed.errors,
        ) {
            self.store()
                .finish_upload(upload_id, UploadStatus::Failed, 0, &parsed.errors, &[])?;
            return Ok(IngestReport::resolved(
                upload_id,
                UploadStatus::Failed,
                0,
                parsed.errors,
            ));
        }
        let ParsedProducts {
            headers,
            rows,
            products: drafts,
            errors,
        } = parsed;

        let mut dynamic = Vec::with_capacity(drafts.len());
        let mut patches = Vec::with_capacity(drafts.len());
        for draft in drafts {
            dynamic.push(dynamic_product_record(&draft, upload_id));
            patches.push(ProductPatch {
                sku: draft.sku,
                title: draft.title,
                cost_price: draft.cost_price,
                packaging_cost: draft.packaging_cost,
                gst_percent: draft.gst_percent,
                orders_seen: 0,
            });
        }

        guard.check()?;
        let records = patches.len() as u32;
        self.store().upsert_products(seller_id, &patches)?;
        self.store()
            .add_unique_dynamic_products(seller_id, &dynamic)?;

        guard.check()?;
        self.run_reconciliation(seller_id)?;

        let columns = infer_columns(&headers, &rows);
        self.store()
            .finish_upload(upload_id, UploadStatus::Processed, records, &errors, &columns)?;
        self.store()
            .mark_current_version(seller_id, FileType::ProductsCsv, upload_id)?;
        self.refresh_cache(seller_id, upload_id);

        Ok(IngestReport::resolved(
            upload_id,
            UploadStatus::Processed,
            records,
            errors,
        ))
    }

    /// Post-ingest cache refresh. The upload already resolved; a cache
    /// problem here is logged and the next read recomputes.
    fn refresh_cache(&self, seller_id: &str, upload_id: &str) {
        if let Err(e) = self.recalculate_all(seller_id, Some(upload_id)) {
            tracing::warn!(seller_id, upload_id, error = %e, "post-ingest cache refresh failed");
        }
    }
}

/// A file failed structurally when parsing produced nothing but errors.
/// Rejected rows still count as "read", so partial files stay processed.
fn file_unreadable(no_typed: bool, no_rows: bool, errors: &[String]) -> bool {
    no_typed && no_rows && !errors.is_empty()
}

// ---------------------------------------------------------------------------
// Dynamic mirrors
// ---------------------------------------------------------------------------

fn extra_cells(raw: &RawRow) -> BTreeMap<String, Scalar> {
    raw.cells
        .iter()
        .filter_map(|(header, value)| {
            Scalar::from_cell(value).map(|scalar| (header.clone(), scalar))
        })
        .collect()
}

fn dynamic_order_record(draft: &OrderDraft, upload_id: &str) -> DynamicRecord {
    DynamicRecord {
        key: draft.sub_order_no.clone(),
        upload_id: upload_id.to_string(),
        known: KnownFields {
            name: Some(draft.product_name.clone()),
            status: Some(draft.reason_for_credit.clone()),
            amount: Some(draft.discounted_price),
            date: draft.order_date,
        },
        extra: extra_cells(&draft.raw),
    }
}

fn dynamic_product_record(draft: &ProductDraft, upload_id: &str) -> DynamicRecord {
    DynamicRecord {
        key: draft.sku.clone(),
        upload_id: upload_id.to_string(),
        known: KnownFields {
            name: (!draft.title.is_empty()).then(|| draft.title.clone()),
            status: None,
            amount: Some(draft.cost_price),
            date: None,
        },
        extra: extra_cells(&draft.raw),
    }
}

/// One overlay row per settlement event. Members of one archive overlap,
/// so these go in add-unique rather than replace.
fn dynamic_settlement_records(
    payments: &[Payment],
    status_updates: &[(String, String)],
    upload_id: &str,
) -> Vec<DynamicRecord> {
    let status_by_sub: HashMap<&str, &str> = status_updates
        .iter()
        .map(|(sub, raw)| (sub.as_str(), raw.as_str()))
        .collect();
    payments
        .iter()
        .map(|p| DynamicRecord {
            key: p.sub_order_no.clone(),
            upload_id: upload_id.to_string(),
            known: KnownFields {
                name: None,
                status: status_by_sub
                    .get(p.sub_order_no.as_str())
                    .map(|s| s.to_string()),
                amount: Some(p.settlement_amount),
                date: Some(p.settlement_date),
            },
            extra: BTreeMap::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hisab_core::PaymentStatus;
    use hisab_store::Store;

    use crate::PipelineConfig;

    fn pipeline() -> Pipeline {
        let store = Store::open_in_memory().unwrap();
        Pipeline::new(Arc::new(store), PipelineConfig::default())
    }

    const ORDERS_CSV: &str = "\
Sub Order No,Order Date,Product Name,SKU,Quantity,Discounted Price,Reason for Credit Entry\n\
SO-1,2024-03-05,Blue Kurti,KUR-BL-M,1,450,DELIVERED\n\
SO-2,2024-03-06,Red Saree,SAR-RD-F,1,799,RETURN\n\
,2024-03-07,No Sub Order,GHOST-1,1,100,DELIVERED\n";

    #[test]
    fn orders_file_lands_with_row_errors_kept() {
        let p = pipeline();
        let report = p
            .ingest_orders_file("seller-1", "orders.csv", ORDERS_CSV.as_bytes())
            .unwrap();

        assert_eq!(report.status, UploadStatus::Processed);
        assert_eq!(report.records_processed, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Sub Order No"));

        let upload = p.store().get_upload(&report.upload_id).unwrap();
        assert!(upload.is_current_version);
        assert_eq!(upload.records_processed, 2);
        assert!(upload.finished_at.is_some());
        assert!(!upload.column_structure.is_empty());

        // Typed rows, seeded catalog and the dynamic mirror all landed.
        assert_eq!(p.store().list_orders("seller-1").unwrap().len(), 2);
        let kurti = p.store().get_product("seller-1", "KUR-BL-M").unwrap().unwrap();
        assert_eq!(kurti.total_orders, 1);
        assert!(!kurti.is_processed);
        let dynamic = p.store().list_dynamic_orders("seller-1").unwrap();
        assert_eq!(dynamic.len(), 2);
        assert_eq!(dynamic[0].known.status.as_deref(), Some("DELIVERED"));
    }

    #[test]
    fn unreadable_orders_file_fails_the_upload() {
        let p = pipeline();
        let report = p
            .ingest_orders_file("seller-1", "orders.csv", b"subOrderNo,productName\nS1,K\n")
            .unwrap();

        assert_eq!(report.status, UploadStatus::Failed);
        assert_eq!(report.records_processed, 0);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("missing required column")));
        let upload = p.store().get_upload(&report.upload_id).unwrap();
        assert_eq!(upload.status, UploadStatus::Failed);
        assert!(!upload.is_current_version);
    }

    #[test]
    fn settlement_resolution_updates_the_order() {
        let p = pipeline();
        p.ingest_orders_file("seller-1", "orders.csv", ORDERS_CSV.as_bytes())
            .unwrap();

        let csv = "\
Sub Order No,Live Order Status,Final Settlement Amount,Payment Date,Total Sale Amount (Incl. Shipping & GST)\n\
SO-1,DELIVERED,391.5,2024-03-20,450\n\
SO-9,DELIVERED,100,2024-03-20,120\n";
        let archive = build_zip(&[("march/settlement.csv", csv.as_bytes())]);
        let report = p
            .ingest_payments_archive("seller-1", "payments.zip", &archive)
            .unwrap();

        assert_eq!(report.status, UploadStatus::Processed);
        assert_eq!(report.records_processed, 2);
        assert!(report.errors.is_empty());

        let order = p.store().get_order("seller-1", "SO-1").unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.payment_date.is_some());
        // SO-9 has no manifest row; its settlement still exists for reports.
        assert!(p.store().get_order("seller-1", "SO-9").unwrap().is_none());
        assert!(p
            .store()
            .latest_payment("seller-1", "SO-9")
            .unwrap()
            .is_some());
    }

    #[test]
    fn corrupt_archive_fails_the_upload() {
        let p = pipeline();
        let report = p
            .ingest_payments_archive("seller-1", "payments.zip", b"not a zip at all")
            .unwrap();
        assert_eq!(report.status, UploadStatus::Failed);
        assert!(!report.errors.is_empty());
    }

    #[test]
    fn products_file_upserts_and_mirrors() {
        let p = pipeline();
        let csv = "\
SKU,Product Name,Cost Price,Packaging Cost,GST %\n\
KUR-BL-M,Blue Kurti,180,12,5\n";
        let report = p
            .ingest_products_file("seller-1", "products.csv", csv.as_bytes())
            .unwrap();

        assert_eq!(report.status, UploadStatus::Processed);
        assert_eq!(report.records_processed, 1);
        let product = p.store().get_product("seller-1", "KUR-BL-M").unwrap().unwrap();
        assert_eq!(product.cost_price, 180.0);
        assert!(product.is_processed);
        let dynamic = p
            .store()
            .list_dynamic_products("seller-1", &report.upload_id)
            .unwrap();
        assert_eq!(dynamic.len(), 1);
        assert_eq!(dynamic[0].key, "KUR-BL-M");
    }

    #[test]
    fn dynamic_order_record_carries_the_raw_row() {
        let draft = OrderDraft {
            sub_order_no: "SO-1".to_string(),
            order_date: None,
            customer_state: String::new(),
            product_name: "Kurti".to_string(),
            sku: "K1".to_string(),
            size: String::new(),
            quantity: 1,
            listed_price: 0.0,
            discounted_price: 450.0,
            packet_id: String::new(),
            reason_for_credit: "DELIVERED".to_string(),
            explicit_payment_status: None,
            raw: RawRow::new(vec![
                ("Sub Order No".to_string(), "SO-1".to_string()),
                ("Courier".to_string(), "Delhivery".to_string()),
                ("Notes".to_string(), "  ".to_string()),
            ]),
        };
        let record = dynamic_order_record(&draft, "up-1");
        assert_eq!(record.key, "SO-1");
        assert_eq!(record.known.amount, Some(450.0));
        assert_eq!(
            record.extra.get("Courier"),
            Some(&Scalar::Text("Delhivery".to_string()))
        );
        // Blank cells stay out of the overlay.
        assert!(!record.extra.contains_key("Notes"));
    }

    // Minimal in-memory zip for archive fixtures.
    fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
        use std::io::Write as _;
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, bytes) in members {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}
