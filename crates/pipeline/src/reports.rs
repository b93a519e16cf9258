//! Cached dashboard reports.
//!
//! The report math lives in `hisab-reports` as pure functions; this layer
//! loads the rows, runs them and parks the JSON in the calculation cache.
//! Cache problems are never fatal: a failed read or write logs a warning
//! and the report is computed fresh.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use hisab_core::FileType;

use crate::{Pipeline, PipelineError};

/// Every report the dashboard can ask for, cache-keyed under
/// `{name}:{seller_id}`.
pub const REPORT_NAMES: [&str; 7] = [
    "live_metrics",
    "orders_overview",
    "revenue_trend",
    "status_distribution",
    "settlement_breakdown",
    "top_products",
    "top_returns",
];

impl Pipeline {
    /// Serve one dashboard report through the calculation cache.
    pub fn dashboard_report(&self, name: &str, seller_id: &str) -> Result<Value, PipelineError> {
        self.dashboard_report_at(name, seller_id, Utc::now())
    }

    /// Clock-parameterized variant; `dashboard_report` passes the wall
    /// clock, tests pin it.
    pub fn dashboard_report_at(
        &self,
        name: &str,
        seller_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Value, PipelineError> {
        if !REPORT_NAMES.contains(&name) {
            return Err(PipelineError::UnknownReport(name.to_string()));
        }
        let key = format!("{name}:{seller_id}");
        let ttl = self.staleness_window(name);

        match self.store().cache_get(&key) {
            Ok(Some(entry)) if entry.age(now) < ttl => {
                tracing::debug!(key, "report served from cache");
                return Ok(entry.result);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(key, error = %e, "cache read failed, recomputing"),
        }

        let value = self.compute_report(name, seller_id, now)?;
        let deps = self.current_upload_ids(seller_id)?;
        if let Err(e) = self.store().cache_set(&key, &value, &deps, now) {
            tracing::warn!(key, error = %e, "cache write failed");
        }
        Ok(value)
    }

    /// Drop every cached result, then eagerly rebuild the seller's live
    /// metrics so the headline read stays warm. Runs after every upload
    /// and after cost edits.
    pub fn recalculate_all(
        &self,
        seller_id: &str,
        trigger_upload: Option<&str>,
    ) -> Result<(), PipelineError> {
        let cleared = self.store().cache_clear()?;
        tracing::info!(
            seller_id,
            cleared,
            trigger_upload = trigger_upload.unwrap_or("-"),
            "calculation cache cleared"
        );
        self.dashboard_report("live_metrics", seller_id)?;
        Ok(())
    }

    /// Drop specific cached reports; the next read recomputes them.
    pub fn invalidate_reports(&self, keys: &[&str]) -> Result<u32, PipelineError> {
        let removed = self.store().cache_delete(keys)?;
        tracing::debug!(removed, "cache entries invalidated");
        Ok(removed)
    }

    /// Drop every cached report computed from the given upload. The
    /// ingestion flows clear wholesale via `recalculate_all`; this is for
    /// embedders that retire an upload out-of-band.
    pub fn invalidate_reports_for_upload(&self, upload_id: &str) -> Result<u32, PipelineError> {
        let removed = self.store().cache_delete_by_upload(upload_id)?;
        tracing::debug!(upload_id, removed, "upload-dependent cache entries invalidated");
        Ok(removed)
    }

    fn staleness_window(&self, name: &str) -> Duration {
        let secs = match name {
            "live_metrics" => self.config().live_metrics_ttl_secs,
            _ => self.config().report_ttl_secs,
        };
        Duration::seconds(secs as i64)
    }

    fn compute_report(
        &self,
        name: &str,
        seller_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Value, PipelineError> {
        let store = self.store();
        let orders = store.list_orders(seller_id)?;
        let payments = store.list_payments(seller_id)?;
        let value = match name {
            "live_metrics" => {
                let products = store.list_products(seller_id)?;
                serde_json::to_value(hisab_reports::live_metrics(&orders, &payments, &products))?
            }
            "orders_overview" => {
                let dynamic = store.list_dynamic_orders(seller_id)?;
                serde_json::to_value(hisab_reports::orders_overview(&orders, &payments, &dynamic))?
            }
            "revenue_trend" => {
                serde_json::to_value(hisab_reports::revenue_trend(&orders, now.date_naive()))?
            }
            "status_distribution" => {
                serde_json::to_value(hisab_reports::status_distribution(&orders))?
            }
            "settlement_breakdown" => {
                serde_json::to_value(hisab_reports::settlement_breakdown(&payments))?
            }
            "top_products" => {
                let products = store.list_products(seller_id)?;
                serde_json::to_value(hisab_reports::top_products(&orders, &products))?
            }
            "top_returns" => {
                let products = store.list_products(seller_id)?;
                serde_json::to_value(hisab_reports::top_returns(&orders, &products))?
            }
            other => return Err(PipelineError::UnknownReport(other.to_string())),
        };
        Ok(value)
    }

    /// Upload ids the current dataset came from; stored beside each cache
    /// entry so upload-scoped invalidation can find dependents.
    fn current_upload_ids(&self, seller_id: &str) -> Result<Vec<String>, PipelineError> {
        let mut deps = Vec::new();
        for file_type in [
            FileType::OrdersCsv,
            FileType::PaymentZip,
            FileType::ProductsCsv,
        ] {
            if let Some(upload) = self.store().current_upload(seller_id, file_type)? {
                deps.push(upload.id);
            }
        }
        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hisab_store::Store;

    use crate::PipelineConfig;

    fn pipeline() -> Pipeline {
        let store = Store::open_in_memory().unwrap();
        Pipeline::new(Arc::new(store), PipelineConfig::default())
    }

    const ORDERS_CSV: &str = "\
Sub Order No,Order Date,Product Name,SKU,Discounted Price,Reason for Credit Entry\n\
SO-1,2024-03-05,Blue Kurti,KUR-BL-M,450,DELIVERED\n\
SO-2,2024-03-06,Red Saree,SAR-RD-F,799,RETURN\n";

    #[test]
    fn unknown_report_name_is_rejected() {
        let p = pipeline();
        let err = p.dashboard_report("net_worth", "seller-1").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownReport(name) if name == "net_worth"));
    }

    #[test]
    fn report_is_cached_until_the_window_lapses() {
        let p = pipeline();
        p.ingest_orders_file("seller-1", "orders.csv", ORDERS_CSV.as_bytes())
            .unwrap();

        let t0 = Utc::now();
        let first = p
            .dashboard_report_at("orders_overview", "seller-1", t0)
            .unwrap();
        assert_eq!(first["totalOrders"], 2);

        // A second manifest lands and wipes the cache.
        p.ingest_orders_file(
            "seller-1",
            "orders2.csv",
            "Sub Order No,Product Name,SKU,Discounted Price,Reason for Credit Entry\n\
SO-3,Green Kurti,KUR-GR-S,300,DELIVERED\n"
                .as_bytes(),
        )
        .unwrap();
        // Re-prime the cache at t0 so staleness is the only variable.
        let primed = p
            .dashboard_report_at("orders_overview", "seller-1", t0)
            .unwrap();
        assert_eq!(primed["totalOrders"], 3);

        let hit = p
            .dashboard_report_at(
                "orders_overview",
                "seller-1",
                t0 + Duration::seconds(599),
            )
            .unwrap();
        assert_eq!(hit, primed);

        let recomputed = p
            .dashboard_report_at(
                "orders_overview",
                "seller-1",
                t0 + Duration::seconds(601),
            )
            .unwrap();
        assert_eq!(recomputed["totalOrders"], 3);
    }

    #[test]
    fn live_metrics_uses_the_shorter_window() {
        let p = pipeline();
        p.ingest_orders_file("seller-1", "orders.csv", ORDERS_CSV.as_bytes())
            .unwrap();
        let t0 = Utc::now();
        p.dashboard_report_at("live_metrics", "seller-1", t0)
            .unwrap();
        let entry = p
            .store()
            .cache_get("live_metrics:seller-1")
            .unwrap()
            .unwrap();
        // 301s is past the 300s live window but inside the 600s default.
        assert!(entry.age(t0 + Duration::seconds(301)) >= Duration::seconds(300));
        let value = p
            .dashboard_report_at("live_metrics", "seller-1", t0 + Duration::seconds(301))
            .unwrap();
        assert_eq!(value["totalOrders"], 2);
    }

    #[test]
    fn cache_entries_record_their_upload_dependencies() {
        let p = pipeline();
        let report = p
            .ingest_orders_file("seller-1", "orders.csv", ORDERS_CSV.as_bytes())
            .unwrap();
        p.dashboard_report("revenue_trend", "seller-1").unwrap();
        let entry = p
            .store()
            .cache_get("revenue_trend:seller-1")
            .unwrap()
            .unwrap();
        assert_eq!(entry.depends_on_uploads, vec![report.upload_id]);
    }

    #[test]
    fn invalidating_a_key_forces_the_next_read_to_recompute() {
        let p = pipeline();
        p.ingest_orders_file("seller-1", "orders.csv", ORDERS_CSV.as_bytes())
            .unwrap();
        p.dashboard_report("revenue_trend", "seller-1").unwrap();
        p.dashboard_report("top_products", "seller-1").unwrap();

        let removed = p.invalidate_reports(&["revenue_trend:seller-1"]).unwrap();
        assert_eq!(removed, 1);
        assert!(p
            .store()
            .cache_get("revenue_trend:seller-1")
            .unwrap()
            .is_none());
        assert!(p
            .store()
            .cache_get("top_products:seller-1")
            .unwrap()
            .is_some());
    }

    #[test]
    fn upload_scoped_invalidation_spares_unrelated_entries() {
        let p = pipeline();
        let report = p
            .ingest_orders_file("seller-1", "orders.csv", ORDERS_CSV.as_bytes())
            .unwrap();
        p.dashboard_report("revenue_trend", "seller-1").unwrap();
        // An entry with no upload dependencies is not touched.
        p.store()
            .cache_set(
                "revenue_trend:seller-2",
                &serde_json::json!({}),
                &[],
                Utc::now(),
            )
            .unwrap();

        // live_metrics (warmed by ingest) and revenue_trend both depend on
        // the manifest upload.
        let removed = p
            .invalidate_reports_for_upload(&report.upload_id)
            .unwrap();
        assert_eq!(removed, 2);
        assert!(p
            .store()
            .cache_get("revenue_trend:seller-1")
            .unwrap()
            .is_none());
        assert!(p
            .store()
            .cache_get("revenue_trend:seller-2")
            .unwrap()
            .is_some());
    }

    #[test]
    fn recalculate_clears_and_rewarms_live_metrics() {
        let p = pipeline();
        p.ingest_orders_file("seller-1", "orders.csv", ORDERS_CSV.as_bytes())
            .unwrap();
        p.dashboard_report("revenue_trend", "seller-1").unwrap();
        p.recalculate_all("seller-1", None).unwrap();
        assert!(p
            .store()
            .cache_get("revenue_trend:seller-1")
            .unwrap()
            .is_none());
        assert!(p
            .store()
            .cache_get("live_metrics:seller-1")
            .unwrap()
            .is_some());
    }
}
