use std::cmp::Ordering;
use std::collections::HashMap;

use hisab_core::{
    normalize_order_status, Order, Payment, Product, ReconStatus, Reconciliation,
};
use serde::Serialize;

use crate::config::ReconConfig;
use crate::policy::{order_profit, ProfitPolicy};

/// Pre-loaded records for one seller's run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconInput<'a> {
    pub orders: &'a [Order],
    pub payments: &'a [Payment],
    pub products: &'a [Product],
}

/// Counters for one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub processed: u32,
    pub reconciled: u32,
    pub mismatched: u32,
    pub unreconciled: u32,
    /// Orders whose sku has no catalog row yet; skipped, not an error.
    pub skipped_no_product: u32,
}

#[derive(Debug, Clone)]
pub struct ReconOutcome {
    pub rows: Vec<Reconciliation>,
    pub summary: ReconSummary,
}

/// Classify every order against its settlement and catalog cost.
///
/// Each run regenerates the full outcome set; classifications can flip
/// retroactively when product costs are edited, so incremental patching
/// would be wrong.
pub fn run(config: &ReconConfig, input: ReconInput<'_>) -> ReconOutcome {
    let picked = latest_by_sub_order(input.payments);

    let by_sku: HashMap<&str, &Product> = input
        .products
        .iter()
        .map(|p| (p.sku.as_str(), p))
        .collect();

    let mut rows = Vec::with_capacity(input.orders.len());
    let mut summary = ReconSummary::default();

    for order in input.orders {
        let product = match by_sku.get(order.sku.as_str()) {
            Some(p) => *p,
            None => {
                tracing::debug!(
                    sub_order_no = %order.sub_order_no,
                    sku = %order.sku,
                    "no catalog row yet, order skipped"
                );
                summary.skipped_no_product += 1;
                continue;
            }
        };

        let payment = picked.get(order.sub_order_no.as_str()).copied();
        let settlement_amount = payment.map(|p| p.settlement_amount).unwrap_or(0.0);
        let ads_cost = payment.map(|p| p.ads_fee).unwrap_or(0.0);
        let order_value = order.discounted_price;

        let status = classify(config, order_value, payment.map(|p| p.settlement_amount));

        let canonical = normalize_order_status(&order.reason_for_credit);
        let profit = order_profit(
            ProfitPolicy::batch(),
            canonical,
            settlement_amount,
            product.cost_price,
            product.packaging_cost,
            ads_cost,
        );

        summary.processed += 1;
        match status {
            ReconStatus::Reconciled => summary.reconciled += 1,
            ReconStatus::Mismatch => summary.mismatched += 1,
            ReconStatus::Unreconciled => summary.unreconciled += 1,
        }

        rows.push(Reconciliation {
            seller_id: order.seller_id.clone(),
            sub_order_no: order.sub_order_no.clone(),
            status,
            order_value,
            settlement_amount,
            product_cost: profit.product_cost,
            packaging_cost: profit.packaging_cost,
            ads_cost: profit.ads_cost,
            gross_profit: profit.gross_profit,
            net_profit: profit.net_profit,
        });
    }

    ReconOutcome { rows, summary }
}

/// Three-way classification of one order's settlement state.
fn classify(config: &ReconConfig, order_value: f64, settlement: Option<f64>) -> ReconStatus {
    match settlement {
        None => ReconStatus::Unreconciled,
        Some(amount) if amount <= 0.0 => ReconStatus::Unreconciled,
        Some(amount) => {
            let expected = order_value * config.settlement_rate;
            if (amount - expected).abs() <= config.tolerance_rupees {
                ReconStatus::Reconciled
            } else {
                ReconStatus::Mismatch
            }
        }
    }
}

/// Index settlements by sub order, keeping the one that decides payment
/// state. Shared by the batch engine and the reporting layer so both agree
/// with the store's `latest_payment` ordering.
pub fn latest_by_sub_order(payments: &[Payment]) -> HashMap<&str, &Payment> {
    let mut picked: HashMap<&str, &Payment> = HashMap::new();
    for p in payments {
        match picked.get(p.sub_order_no.as_str()) {
            Some(incumbent) if !prefer(p, incumbent) => {}
            _ => {
                picked.insert(p.sub_order_no.as_str(), p);
            }
        }
    }
    picked
}

/// Settlement pick order: later settlement date wins; same date, the larger
/// absolute amount; still tied, the earlier row stays.
fn prefer(candidate: &Payment, incumbent: &Payment) -> bool {
    match candidate.settlement_date.cmp(&incumbent.settlement_date) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            candidate.settlement_amount.abs() > incumbent.settlement_amount.abs()
        }
    }
}
