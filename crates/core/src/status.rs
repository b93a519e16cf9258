//! Status vocabulary canonicalization and payment-status resolution.

use crate::model::{CanonicalStatus, PaymentStatus};

/// Map a raw marketplace status string onto the canonical vocabulary.
///
/// Matching is case-insensitive and treats runs of spaces, hyphens and
/// underscores as one separator, so `"RTO LOCKED"`, `"rto_locked"` and
/// `"RTO-Locked"` all land on RTO. Unmapped values return `Unknown`; the
/// caller keeps the raw string so nothing is dropped.
pub fn normalize_order_status(raw: &str) -> CanonicalStatus {
    let folded = raw
        .trim()
        .to_ascii_lowercase()
        .split(|c: char| c == ' ' || c == '-' || c == '_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    match folded.as_str() {
        "delivered" | "delivery_done" | "completed" => CanonicalStatus::Delivered,

        "shipped" | "in_transit" | "intransit" | "ready_to_ship" | "ofd"
        | "out_for_delivery" | "dispatched" | "pickup_complete" => CanonicalStatus::Shipped,

        "return" | "returned" | "customer_return" | "return_complete" | "return_initiated"
        | "return_requested" => CanonicalStatus::Return,

        "rto" | "rto_complete" | "rto_locked" | "rto_ofd" | "rto_initiated"
        | "rto_in_transit" | "return_to_origin" => CanonicalStatus::Rto,

        "cancelled" | "canceled" | "cancel" | "cancellation_done" => CanonicalStatus::Cancelled,

        "exchanged" | "exchange" | "door_step_exchanged" => CanonicalStatus::Exchanged,

        "" => CanonicalStatus::Unknown,
        _ => {
            tracing::debug!(status = raw, "unmapped order status");
            CanonicalStatus::Unknown
        }
    }
}

/// Resolve the payment status for an order from whichever signals exist.
///
/// Precedence: a finite settlement amount wins (positive paid, otherwise
/// refunded); then the canonical order status; then any explicit
/// payment-status cell on the row; default Pending. Payment data can arrive
/// in a later file or never, so every layer is optional.
pub fn derive_payment_status(
    status: CanonicalStatus,
    settlement_amount: Option<f64>,
    explicit: Option<&str>,
) -> PaymentStatus {
    if let Some(amount) = settlement_amount {
        if amount.is_finite() {
            return if amount > 0.0 {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Refunded
            };
        }
    }

    match status {
        CanonicalStatus::Delivered => PaymentStatus::Paid,
        CanonicalStatus::Return | CanonicalStatus::Rto => PaymentStatus::Refunded,
        CanonicalStatus::Cancelled => PaymentStatus::Na,
        CanonicalStatus::Shipped => PaymentStatus::Pending,
        CanonicalStatus::Exchanged | CanonicalStatus::Unknown => explicit
            .and_then(PaymentStatus::parse)
            .unwrap_or(PaymentStatus::Pending),
    }
}
