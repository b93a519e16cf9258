//! Settlement component breakdown.
//!
//! Settlement spreadsheets carry per-order fees but no shipping, TCS or TDS
//! columns, so those three lines are estimated from order counts and sale
//! totals. Estimated lines are flagged so the dashboard can render them
//! apart from figures read straight off payment records.

use std::collections::HashSet;

use hisab_core::Payment;
use serde::Serialize;

/// Flat forward+return shipping estimate per order, in rupees.
const SHIPPING_PER_ORDER: f64 = 49.0;
/// Tax collected at source, applied to the sale total.
const TCS_RATE: f64 = 0.001;
/// Tax deducted at source, applied to the positive settlement total.
const TDS_RATE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementLine {
    pub name: &'static str,
    pub amount: f64,
    pub estimated: bool,
}

/// Fold settlement events into the fixed ordered line-item list.
///
/// Every line is always present, zero or not, so the dashboard table keeps
/// its shape. Cost lines carry negative amounts; Sale Amount and Final
/// Settlement keep the sign of the underlying sums.
pub fn settlement_breakdown(payments: &[Payment]) -> Vec<SettlementLine> {
    let mut sale = 0.0;
    let mut returns = 0.0;
    let mut positive_settled = 0.0;
    let mut final_settlement = 0.0;
    let mut commission = 0.0;
    let mut fixed = 0.0;
    let mut gateway = 0.0;
    let mut ads = 0.0;
    let mut subs: HashSet<&str> = HashSet::new();

    for p in payments {
        subs.insert(p.sub_order_no.as_str());
        final_settlement += p.settlement_amount;
        if p.settlement_amount > 0.0 {
            sale += p.order_value;
            positive_settled += p.settlement_amount;
        } else if p.settlement_amount < 0.0 {
            returns += p.settlement_amount;
        }
        commission += p.commission_fee;
        fixed += p.fixed_fee;
        gateway += p.gateway_fee;
        ads += p.ads_fee;
    }

    let shipping = -(SHIPPING_PER_ORDER * subs.len() as f64);

    vec![
        line("Sale Amount", sale, false),
        line("Returns", returns, false),
        line("Shipping", shipping, true),
        line("Commission", -commission, false),
        line("Fixed Fee", -fixed, false),
        line("Payment Gateway Fee", -gateway, false),
        line("Ads Fee", -ads, false),
        line("TCS", -(TCS_RATE * sale), true),
        line("TDS", -(TDS_RATE * positive_settled), true),
        line("Final Settlement", final_settlement, false),
    ]
}

fn line(name: &'static str, amount: f64, estimated: bool) -> SettlementLine {
    SettlementLine {
        name,
        amount,
        estimated,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn payment(sub: &str, amount: f64, order_value: f64, fees: [f64; 4]) -> Payment {
        Payment {
            seller_id: "s1".into(),
            sub_order_no: sub.into(),
            settlement_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            settlement_amount: amount,
            order_value,
            commission_fee: fees[0],
            fixed_fee: fees[1],
            gateway_fee: fees[2],
            ads_fee: fees[3],
            upload_id: "u1".into(),
        }
    }

    fn amount_of<'a>(lines: &'a [SettlementLine], name: &str) -> f64 {
        lines.iter().find(|l| l.name == name).unwrap().amount
    }

    #[test]
    fn line_order_is_fixed_and_complete() {
        let lines = settlement_breakdown(&[]);

        let names: Vec<&str> = lines.iter().map(|l| l.name).collect();
        assert_eq!(
            names,
            [
                "Sale Amount",
                "Returns",
                "Shipping",
                "Commission",
                "Fixed Fee",
                "Payment Gateway Fee",
                "Ads Fee",
                "TCS",
                "TDS",
                "Final Settlement",
            ]
        );
        assert!(lines.iter().all(|l| l.amount == 0.0));
    }

    #[test]
    fn fees_come_out_negative_and_sales_positive() {
        let payments = vec![
            payment("S1", 870.0, 1000.0, [50.0, 10.0, 15.0, 20.0]),
            payment("S2", -250.0, 500.0, [0.0, 0.0, 0.0, 0.0]),
        ];

        let lines = settlement_breakdown(&payments);

        assert_eq!(amount_of(&lines, "Sale Amount"), 1000.0);
        assert_eq!(amount_of(&lines, "Returns"), -250.0);
        assert_eq!(amount_of(&lines, "Commission"), -50.0);
        assert_eq!(amount_of(&lines, "Fixed Fee"), -10.0);
        assert_eq!(amount_of(&lines, "Payment Gateway Fee"), -15.0);
        assert_eq!(amount_of(&lines, "Ads Fee"), -20.0);
        assert_eq!(amount_of(&lines, "Final Settlement"), 620.0);
    }

    #[test]
    fn shipping_counts_each_order_once() {
        let mut later = payment("S1", 30.0, 0.0, [0.0; 4]);
        later.settlement_date = NaiveDate::from_ymd_opt(2024, 3, 22).unwrap();
        let payments = vec![
            payment("S1", 870.0, 1000.0, [0.0; 4]),
            later,
            payment("S2", -250.0, 500.0, [0.0; 4]),
        ];

        let lines = settlement_breakdown(&payments);

        assert_eq!(amount_of(&lines, "Shipping"), -98.0);
    }

    #[test]
    fn tcs_and_tds_are_estimated_from_totals() {
        let mut second = payment("S2", 30.0, 0.0, [0.0; 4]);
        second.settlement_date = NaiveDate::from_ymd_opt(2024, 3, 22).unwrap();
        let payments = vec![
            payment("S1", 870.0, 1000.0, [0.0; 4]),
            second,
            payment("S3", -250.0, 500.0, [0.0; 4]),
        ];

        let lines = settlement_breakdown(&payments);

        // TCS on the 1000 sale, TDS on the 900 of positive settlement.
        assert!((amount_of(&lines, "TCS") + 1.0).abs() < 1e-9);
        assert!((amount_of(&lines, "TDS") + 9.0).abs() < 1e-9);

        let estimated: Vec<&str> = lines
            .iter()
            .filter(|l| l.estimated)
            .map(|l| l.name)
            .collect();
        assert_eq!(estimated, ["Shipping", "TCS", "TDS"]);
    }
}
