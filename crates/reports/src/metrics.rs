//! Headline dashboard rollup.

use std::collections::HashMap;

use hisab_core::{normalize_order_status, Order, Payment, Product};
use hisab_recon::{latest_by_sub_order, order_profit, ProfitPolicy};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMetrics {
    pub total_orders: u32,
    /// Sum of discounted prices across every order.
    pub total_revenue: f64,
    /// Sum over every settlement event, clawbacks included.
    pub settled_amount: f64,
    /// Display-policy profit: ads not charged, product cost waived on
    /// returns. Orders without a catalog row contribute revenue only.
    pub net_profit: f64,
    pub return_count: u32,
}

/// Roll the whole ledger into the five headline numbers.
///
/// Profit per order uses the settlement event that decides its payment
/// state, the same pick as the reconciliation engine, so the headline and
/// the per-order table never disagree.
pub fn live_metrics(orders: &[Order], payments: &[Payment], products: &[Product]) -> LiveMetrics {
    let by_sku: HashMap<&str, &Product> = products
        .iter()
        .map(|p| (p.sku.as_str(), p))
        .collect();
    let picked = latest_by_sub_order(payments);
    let policy = ProfitPolicy::display();

    let mut total_revenue = 0.0;
    let mut net_profit = 0.0;
    let mut return_count = 0u32;

    for order in orders {
        total_revenue += order.discounted_price;

        let status = normalize_order_status(&order.reason_for_credit);
        if status.is_return_like() {
            return_count += 1;
        }

        if let Some(product) = by_sku.get(order.sku.as_str()) {
            let payment = picked.get(order.sub_order_no.as_str()).copied();
            let profit = order_profit(
                policy,
                status,
                payment.map(|p| p.settlement_amount).unwrap_or(0.0),
                product.cost_price,
                product.packaging_cost,
                payment.map(|p| p.ads_fee).unwrap_or(0.0),
            );
            net_profit += profit.net_profit;
        }
    }

    LiveMetrics {
        total_orders: orders.len() as u32,
        total_revenue,
        settled_amount: payments.iter().map(|p| p.settlement_amount).sum(),
        net_profit,
        return_count,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use hisab_core::PaymentStatus;

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn order(sub: &str, sku: &str, price: f64, raw_status: &str) -> Order {
        Order {
            seller_id: "s1".into(),
            sub_order_no: sub.into(),
            order_date: day(1),
            customer_state: "Bihar".into(),
            product_name: "Cotton Kurta".into(),
            sku: sku.into(),
            size: "M".into(),
            quantity: 1,
            listed_price: price + 100.0,
            discounted_price: price,
            packet_id: String::new(),
            reason_for_credit: raw_status.into(),
            payment_status: PaymentStatus::Pending,
            payment_date: None,
            upload_id: "u1".into(),
        }
    }

    fn payment(sub: &str, date: NaiveDate, amount: f64) -> Payment {
        Payment {
            seller_id: "s1".into(),
            sub_order_no: sub.into(),
            settlement_date: date,
            settlement_amount: amount,
            order_value: 0.0,
            commission_fee: 0.0,
            fixed_fee: 0.0,
            gateway_fee: 0.0,
            ads_fee: 0.0,
            upload_id: "u2".into(),
        }
    }

    fn product(sku: &str, cost: f64, packaging: f64) -> Product {
        Product {
            seller_id: "s1".into(),
            sku: sku.into(),
            title: "Cotton Kurta".into(),
            cost_price: cost,
            packaging_cost: packaging,
            gst_percent: 5.0,
            total_orders: 0,
            is_processed: true,
        }
    }

    #[test]
    fn headline_numbers_roll_up() {
        let orders = vec![
            order("S1", "KURTA-M", 500.0, "DELIVERED"),
            order("S2", "KURTA-M", 500.0, "RTO_COMPLETE"),
            order("S3", "KURTA-M", 300.0, "DELIVERED"),
        ];
        let payments = vec![payment("S1", day(20), 435.0), payment("S2", day(21), -80.0)];
        let catalog = vec![product("KURTA-M", 200.0, 20.0)];

        let m = live_metrics(&orders, &payments, &catalog);

        assert_eq!(m.total_orders, 3);
        assert_eq!(m.total_revenue, 1300.0);
        assert_eq!(m.settled_amount, 355.0);
        assert_eq!(m.return_count, 1);
        // S1: 435 - 220. S2: product waived, -80 - 20. S3: unsettled, -220.
        assert_eq!(m.net_profit, 215.0 - 100.0 - 220.0);
    }

    #[test]
    fn profit_follows_the_latest_settlement_event() {
        let orders = vec![order("S1", "KURTA-M", 500.0, "DELIVERED")];
        let payments = vec![payment("S1", day(10), 100.0), payment("S1", day(20), 435.0)];
        let catalog = vec![product("KURTA-M", 200.0, 20.0)];

        let m = live_metrics(&orders, &payments, &catalog);

        // Settled sums every event; profit only sees the deciding one.
        assert_eq!(m.settled_amount, 535.0);
        assert_eq!(m.net_profit, 215.0);
    }

    #[test]
    fn orders_without_catalog_rows_still_count_revenue() {
        let orders = vec![order("S1", "FRESH-SKU", 450.0, "DELIVERED")];

        let m = live_metrics(&orders, &[], &[]);

        assert_eq!(m.total_orders, 1);
        assert_eq!(m.total_revenue, 450.0);
        assert_eq!(m.net_profit, 0.0);
    }
}
