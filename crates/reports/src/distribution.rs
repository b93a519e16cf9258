//! Order-status distribution with the dashboard color table.

use std::collections::{BTreeMap, HashMap};

use hisab_core::{normalize_order_status, CanonicalStatus, Order};
use serde::Serialize;

/// Chart color for statuses outside the canonical vocabulary.
const UNKNOWN_COLOR: &str = "#9ca3af";

/// Label/color table for the canonical vocabulary, in display order.
const PALETTE: [(CanonicalStatus, &str); 6] = [
    (CanonicalStatus::Delivered, "#22c55e"),
    (CanonicalStatus::Shipped, "#3b82f6"),
    (CanonicalStatus::Return, "#f97316"),
    (CanonicalStatus::Rto, "#ef4444"),
    (CanonicalStatus::Cancelled, "#6b7280"),
    (CanonicalStatus::Exchanged, "#a855f7"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSlice {
    pub status: CanonicalStatus,
    pub label: String,
    pub color: &'static str,
    pub count: u32,
}

/// Count orders per canonical status.
///
/// Unmapped statuses keep their raw string as the slice label so nothing
/// disappears from the chart; they trail the canonical slices sorted by
/// label. Zero-count statuses are omitted.
pub fn status_distribution(orders: &[Order]) -> Vec<StatusSlice> {
    let mut canonical: HashMap<CanonicalStatus, u32> = HashMap::new();
    let mut unknown: BTreeMap<String, u32> = BTreeMap::new();

    for order in orders {
        let status = normalize_order_status(&order.reason_for_credit);
        if status == CanonicalStatus::Unknown {
            let raw = order.reason_for_credit.trim();
            let label = if raw.is_empty() { "Unknown" } else { raw };
            *unknown.entry(label.to_string()).or_insert(0) += 1;
        } else {
            *canonical.entry(status).or_insert(0) += 1;
        }
    }

    let mut slices = Vec::new();
    for (status, color) in PALETTE {
        if let Some(&count) = canonical.get(&status) {
            slices.push(StatusSlice {
                status,
                label: status.as_str().to_string(),
                color,
                count,
            });
        }
    }
    for (label, count) in unknown {
        slices.push(StatusSlice {
            status: CanonicalStatus::Unknown,
            label,
            color: UNKNOWN_COLOR,
            count,
        });
    }
    slices
}
