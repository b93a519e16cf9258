//! Single-pass orders overview for the dashboard header.

use std::collections::{BTreeMap, HashMap, HashSet};

use hisab_core::{normalize_order_status, CanonicalStatus, DynamicRecord, Order, Payment};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersOverview {
    pub total_orders: u32,
    pub status_counts: BTreeMap<String, u32>,
    /// Average discounted price across delivered orders.
    pub avg_order_value: f64,
    /// Returns as a percentage of delivered orders.
    pub return_rate: f64,
    /// Delivered orders with no settlement event yet.
    pub awaiting_payment: u32,
}

/// Resolve every order's status once and derive the header figures.
///
/// A dynamic row's status field, when present and non-blank, wins over the
/// static order row: dynamic rows come from the most recent upload, so they
/// are the fresher read of the marketplace.
pub fn orders_overview(
    orders: &[Order],
    payments: &[Payment],
    dynamic_orders: &[DynamicRecord],
) -> OrdersOverview {
    let fresh_status: HashMap<&str, &str> = dynamic_orders
        .iter()
        .filter_map(|r| {
            r.known
                .status
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| (r.key.as_str(), s))
        })
        .collect();
    let settled_subs: HashSet<&str> = payments.iter().map(|p| p.sub_order_no.as_str()).collect();

    let mut status_counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut delivered = 0u32;
    let mut delivered_value = 0.0;
    let mut returns = 0u32;
    let mut awaiting = 0u32;

    for order in orders {
        let raw = fresh_status
            .get(order.sub_order_no.as_str())
            .copied()
            .unwrap_or(order.reason_for_credit.as_str());
        let status = normalize_order_status(raw);
        *status_counts.entry(status.as_str().to_string()).or_insert(0) += 1;

        match status {
            CanonicalStatus::Delivered => {
                delivered += 1;
                delivered_value += order.discounted_price;
                if !settled_subs.contains(order.sub_order_no.as_str()) {
                    awaiting += 1;
                }
            }
            CanonicalStatus::Return => returns += 1,
            _ => {}
        }
    }

    let avg_order_value = if delivered > 0 {
        delivered_value / f64::from(delivered)
    } else {
        0.0
    };
    let return_rate = if delivered > 0 {
        f64::from(returns) / f64::from(delivered) * 100.0
    } else {
        0.0
    };

    OrdersOverview {
        total_orders: orders.len() as u32,
        status_counts,
        avg_order_value,
        return_rate,
        awaiting_payment: awaiting,
    }
}
