use chrono::NaiveDate;
use hisab_core::{Order, Payment, PaymentStatus, Product, ReconStatus};
use hisab_recon::{run, ProfitPolicy, ReconConfig, ReconInput};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn order(sub: &str, sku: &str, price: f64, raw_status: &str) -> Order {
    Order {
        seller_id: "seller-1".to_string(),
        sub_order_no: sub.to_string(),
        order_date: day(2024, 1, 5),
        customer_state: "Maharashtra".to_string(),
        product_name: "Cotton Kurti".to_string(),
        sku: sku.to_string(),
        size: "L".to_string(),
        quantity: 1,
        listed_price: price,
        discounted_price: price,
        packet_id: "PKT01".to_string(),
        reason_for_credit: raw_status.to_string(),
        payment_status: PaymentStatus::Pending,
        payment_date: None,
        upload_id: "up-orders".to_string(),
    }
}

fn payment(sub: &str, date: NaiveDate, amount: f64, ads: f64) -> Payment {
    Payment {
        seller_id: "seller-1".to_string(),
        sub_order_no: sub.to_string(),
        settlement_date: date,
        settlement_amount: amount,
        order_value: 0.0,
        commission_fee: 12.0,
        fixed_fee: 5.0,
        gateway_fee: 9.0,
        ads_fee: ads,
        upload_id: "up-pay".to_string(),
    }
}

fn product(sku: &str, cost: f64, packaging: f64) -> Product {
    Product {
        seller_id: "seller-1".to_string(),
        sku: sku.to_string(),
        title: "Cotton Kurti".to_string(),
        cost_price: cost,
        packaging_cost: packaging,
        gst_percent: 5.0,
        total_orders: 3,
        is_processed: true,
    }
}

// -------------------------------------------------------------------------
// Classification
// -------------------------------------------------------------------------

#[test]
fn mixed_ledger_classifies_every_order() {
    let config = ReconConfig::default();
    let orders = vec![
        order("S-DEL", "K1", 1000.0, "Delivered"),
        order("S-EDGE", "K1", 1000.0, "Delivered"),
        order("S-OVER", "K1", 1000.0, "Delivered"),
        order("S-WAIT", "K1", 800.0, "Shipped"),
        order("S-RTO", "K1", 600.0, "RTO_COMPLETE"),
        order("S-NEW", "FRESH-SKU", 500.0, "Delivered"),
    ];
    let payments = vec![
        payment("S-DEL", day(2024, 1, 20), 870.0, 0.0),
        payment("S-EDGE", day(2024, 1, 20), 875.0, 0.0),
        payment("S-OVER", day(2024, 1, 20), 876.0, 0.0),
        payment("S-RTO", day(2024, 1, 22), -64.0, 0.0),
    ];
    let products = vec![product("K1", 400.0, 20.0)];

    let out = run(
        &config,
        ReconInput {
            orders: &orders,
            payments: &payments,
            products: &products,
        },
    );

    assert_eq!(out.summary.processed, 5);
    assert_eq!(out.summary.skipped_no_product, 1);
    assert_eq!(out.summary.reconciled, 2);
    assert_eq!(out.summary.mismatched, 1);
    assert_eq!(out.summary.unreconciled, 2);

    let status_of = |sub: &str| {
        out.rows
            .iter()
            .find(|r| r.sub_order_no == sub)
            .map(|r| r.status)
            .unwrap()
    };
    assert_eq!(status_of("S-DEL"), ReconStatus::Reconciled);
    assert_eq!(status_of("S-EDGE"), ReconStatus::Reconciled);
    assert_eq!(status_of("S-OVER"), ReconStatus::Mismatch);
    assert_eq!(status_of("S-WAIT"), ReconStatus::Unreconciled);
    assert_eq!(status_of("S-RTO"), ReconStatus::Unreconciled);
    assert!(out.rows.iter().all(|r| r.sub_order_no != "S-NEW"));
}

#[test]
fn rerun_after_cost_edit_can_flip_nothing_but_profit() {
    // Classification depends on settlement vs expected, not on costs;
    // a cost edit changes profit figures without touching statuses.
    let config = ReconConfig::default();
    let orders = vec![order("S1", "K1", 1000.0, "Delivered")];
    let payments = vec![payment("S1", day(2024, 1, 20), 870.0, 0.0)];

    let before = run(
        &config,
        ReconInput {
            orders: &orders,
            payments: &payments,
            products: &[product("K1", 400.0, 20.0)],
        },
    );
    let after = run(
        &config,
        ReconInput {
            orders: &orders,
            payments: &payments,
            products: &[product("K1", 500.0, 20.0)],
        },
    );

    assert_eq!(before.rows[0].status, after.rows[0].status);
    assert_eq!(before.rows[0].gross_profit, 450.0);
    assert_eq!(after.rows[0].gross_profit, 350.0);
}

#[test]
fn custom_tolerance_widens_the_band() {
    let config = ReconConfig::from_toml("tolerance_rupees = 10.0").unwrap();
    let orders = vec![order("S1", "K1", 1000.0, "Delivered")];
    let payments = vec![payment("S1", day(2024, 1, 20), 876.0, 0.0)];
    let products = vec![product("K1", 400.0, 20.0)];

    let out = run(
        &config,
        ReconInput {
            orders: &orders,
            payments: &payments,
            products: &products,
        },
    );
    assert_eq!(out.rows[0].status, ReconStatus::Reconciled);
}

// -------------------------------------------------------------------------
// Settlement pick + profit policies
// -------------------------------------------------------------------------

#[test]
fn clawback_after_payout_flips_to_unreconciled() {
    let config = ReconConfig::default();
    let orders = vec![order("S1", "K1", 1000.0, "RTO")];
    let payments = vec![
        payment("S1", day(2024, 1, 20), 870.0, 0.0),
        payment("S1", day(2024, 2, 3), -870.0, 0.0),
    ];
    let products = vec![product("K1", 400.0, 20.0)];

    let out = run(
        &config,
        ReconInput {
            orders: &orders,
            payments: &payments,
            products: &products,
        },
    );
    assert_eq!(out.rows[0].status, ReconStatus::Unreconciled);
    assert_eq!(out.rows[0].settlement_amount, -870.0);
    // Batch view still charges the product cost on the RTO.
    assert_eq!(out.rows[0].product_cost, 400.0);
}

#[test]
fn batch_and_display_views_diverge_on_returns() {
    let orders = vec![order("S1", "K1", 1000.0, "Return")];
    let payments = vec![payment("S1", day(2024, 1, 25), -120.0, 15.0)];
    let products = vec![product("K1", 400.0, 20.0)];

    let out = run(
        &ReconConfig::default(),
        ReconInput {
            orders: &orders,
            payments: &payments,
            products: &products,
        },
    );
    // Batch: full COGS, ads charged.
    assert_eq!(out.rows[0].gross_profit, -120.0 - 420.0);
    assert_eq!(out.rows[0].net_profit, -120.0 - 420.0 - 15.0);

    // Display: product cost waived, ads not charged.
    let display = hisab_recon::order_profit(
        ProfitPolicy::display(),
        hisab_core::CanonicalStatus::Return,
        -120.0,
        400.0,
        20.0,
        15.0,
    );
    assert_eq!(display.gross_profit, -140.0);
    assert_eq!(display.net_profit, -140.0);
}
