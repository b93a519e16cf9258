//! Daily revenue and order-count trend.

use chrono::{Duration, NaiveDate};
use hisab_core::Order;
use serde::Serialize;

/// Days covered by the rolling trend window, reference date inclusive.
pub const TREND_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub revenue: f64,
    pub orders: u32,
}

/// Orders and revenue per day over the rolling window ending at `reference`.
///
/// Every day in the window gets a point, zero-filled when nothing was
/// ordered, so chart axes stay stable across refreshes.
pub fn revenue_trend(orders: &[Order], reference: NaiveDate) -> Vec<TrendPoint> {
    let start = reference - Duration::days(TREND_WINDOW_DAYS - 1);
    let mut points: Vec<TrendPoint> = (0..TREND_WINDOW_DAYS)
        .map(|offset| TrendPoint {
            date: start + Duration::days(offset),
            revenue: 0.0,
            orders: 0,
        })
        .collect();

    for order in orders {
        if order.order_date < start || order.order_date > reference {
            continue;
        }
        let idx = (order.order_date - start).num_days() as usize;
        points[idx].revenue += order.discounted_price;
        points[idx].orders += 1;
    }

    points
}

#[cfg(test)]
mod tests {
    use hisab_core::PaymentStatus;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order(sub: &str, date: NaiveDate, price: f64) -> Order {
        Order {
            seller_id: "s1".into(),
            sub_order_no: sub.into(),
            order_date: date,
            customer_state: "Karnataka".into(),
            product_name: "Cotton Kurta".into(),
            sku: "KURTA-M".into(),
            size: "M".into(),
            quantity: 1,
            listed_price: price + 100.0,
            discounted_price: price,
            packet_id: String::new(),
            reason_for_credit: "DELIVERED".into(),
            payment_status: PaymentStatus::Pending,
            payment_date: None,
            upload_id: "u1".into(),
        }
    }

    #[test]
    fn window_is_thirty_days_and_zero_filled() {
        let points = revenue_trend(&[], day(2024, 3, 31));

        assert_eq!(points.len(), 30);
        assert_eq!(points[0].date, day(2024, 3, 2));
        assert_eq!(points[29].date, day(2024, 3, 31));
        assert!(points.iter().all(|p| p.orders == 0 && p.revenue == 0.0));
    }

    #[test]
    fn orders_accumulate_on_their_day() {
        let orders = vec![
            order("S1", day(2024, 3, 10), 450.0),
            order("S2", day(2024, 3, 10), 550.0),
            order("S3", day(2024, 3, 31), 300.0),
        ];

        let points = revenue_trend(&orders, day(2024, 3, 31));

        let tenth = points.iter().find(|p| p.date == day(2024, 3, 10)).unwrap();
        assert_eq!(tenth.orders, 2);
        assert_eq!(tenth.revenue, 1000.0);
        assert_eq!(points[29].orders, 1);
        assert_eq!(points[29].revenue, 300.0);
    }

    #[test]
    fn orders_outside_the_window_are_dropped() {
        let orders = vec![
            order("OLD", day(2024, 3, 1), 999.0),
            order("FUTURE", day(2024, 4, 1), 999.0),
            order("EDGE", day(2024, 3, 2), 120.0),
        ];

        let points = revenue_trend(&orders, day(2024, 3, 31));

        let total: f64 = points.iter().map(|p| p.revenue).sum();
        assert_eq!(total, 120.0);
        assert_eq!(points[0].orders, 1);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let points = revenue_trend(&[order("S1", day(2024, 3, 31), 450.0)], day(2024, 3, 31));
        let json = serde_json::to_value(&points[29]).unwrap();

        assert_eq!(json["date"], "2024-03-31");
        assert_eq!(json["revenue"], 450.0);
        assert_eq!(json["orders"], 1);
    }
}
