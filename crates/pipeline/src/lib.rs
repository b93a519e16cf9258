//! Orchestration layer for the Hisab ledger.
//!
//! One [`Pipeline`] owns a shared [`Store`] handle plus configuration and
//! exposes the operations outer surfaces map 1:1: quota-gated ingestion of
//! the three source file kinds, reconciliation runs, cached dashboard
//! reports and cost edits. [`jobs::JobQueue`] layers a background worker
//! pool over the same synchronous steps.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use hisab_recon::{ReconInput, ReconSummary};
use hisab_store::{QuotaOutcome, Store, UsageCounter};

pub mod config;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod reports;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use ingest::IngestReport;
pub use jobs::{JobKind, JobQueue};
pub use reports::REPORT_NAMES;

/// Every write path and derived read goes through one of these.
///
/// Cloning is cheap; the queue hands a clone to each worker thread and the
/// store serializes access internally.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<Store>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(store: Arc<Store>, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Quota
    // -----------------------------------------------------------------------

    /// Spend one unit of the seller's monthly quota, or reject the upload
    /// before any row is written. The check-and-increment is a single
    /// conditional update in the store, so parallel submissions cannot
    /// overshoot the limit.
    pub fn consume_quota(&self, seller_id: &str) -> Result<(), PipelineError> {
        self.consume_quota_at(seller_id, Utc::now().date_naive())
    }

    fn consume_quota_at(&self, seller_id: &str, today: NaiveDate) -> Result<(), PipelineError> {
        let limit = self.config.monthly_upload_limit;
        match self
            .store
            .try_consume_upload(seller_id, today.year(), today.month(), limit)?
        {
            QuotaOutcome::Allowed { used } => {
                tracing::debug!(seller_id, used, limit, "upload quota consumed");
                Ok(())
            }
            QuotaOutcome::Exhausted { used } => Err(PipelineError::QuotaExceeded {
                used,
                limit,
                resets_on: first_of_next_month(today),
            }),
        }
    }

    /// Current month's usage counter, if the seller has uploaded anything.
    pub fn usage(&self, seller_id: &str) -> Result<Option<UsageCounter>, PipelineError> {
        Ok(self.store.get_usage(seller_id)?)
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Regenerate the seller's reconciliation table from current rows.
    ///
    /// Runs after every ingestion and after cost edits; classifications can
    /// flip retroactively, so the outcome set is replaced wholesale.
    pub fn run_reconciliation(&self, seller_id: &str) -> Result<ReconSummary, PipelineError> {
        let orders = self.store.list_orders(seller_id)?;
        let payments = self.store.list_payments(seller_id)?;
        let products = self.store.list_products(seller_id)?;
        let outcome = hisab_recon::run(
            &self.config.recon,
            ReconInput {
                orders: &orders,
                payments: &payments,
                products: &products,
            },
        );
        self.store
            .replace_reconciliations(seller_id, &outcome.rows)?;
        tracing::info!(
            seller_id,
            processed = outcome.summary.processed,
            reconciled = outcome.summary.reconciled,
            mismatched = outcome.summary.mismatched,
            unreconciled = outcome.summary.unreconciled,
            "reconciliation stored"
        );
        Ok(outcome.summary)
    }

    // -----------------------------------------------------------------------
    // Cost edits
    // -----------------------------------------------------------------------

    /// Seller edit of one sku's cost fields, then the same derived-state
    /// refresh an upload triggers. Passing `None` for GST keeps the stored
    /// percentage.
    pub fn set_product_costs(
        &self,
        seller_id: &str,
        sku: &str,
        cost_price: f64,
        packaging_cost: f64,
        gst_percent: Option<f64>,
    ) -> Result<ReconSummary, PipelineError> {
        self.store
            .set_product_costs(seller_id, sku, cost_price, packaging_cost, gst_percent)?;
        let summary = self.run_reconciliation(seller_id)?;
        self.recalculate_all(seller_id, None)?;
        Ok(summary)
    }
}

/// First day of the month after `today`, when the quota counter rolls over.
fn first_of_next_month(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
}
